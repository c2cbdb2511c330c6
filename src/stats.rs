pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            mean: self.mean,
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_std_dev() {
        let mut acc = Accumulator::new();
        for val in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            acc.add(val);
        }
        let report = acc.report();
        assert!((report.mean - 5.0).abs() < 1e-12);
        assert!((report.std_dev - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn single_value_has_no_std_dev() {
        let mut acc = Accumulator::new();
        acc.add(3.5);
        let report = acc.report();
        assert_eq!(report.mean, 3.5);
        assert!(report.std_dev.is_nan());
    }
}
