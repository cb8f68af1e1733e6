//! Epoch-end callbacks: early stopping and learning-rate reduction, both
//! watching the validation loss.

use crate::history::EpochLogs;

/// What the training loop should do after an epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Continue,
    Stop,
    SetLearningRate(f64),
}

pub trait Callback {
    /// Identifies the callback in training logs.
    fn name(&self) -> &'static str;

    /// Inspect the finished epoch. `lr` is the current learning rate.
    fn on_epoch_end(&mut self, logs: &EpochLogs, lr: f64) -> Action;
}

/// Stop once the monitored loss failed to improve for `patience` epochs.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    pub patience: usize,
    pub min_delta: f32,
    best: f32,
    wait: usize,
    stopped_epoch: Option<usize>,
}

impl EarlyStopping {
    pub fn new(patience: usize, min_delta: f32) -> Self {
        Self {
            patience,
            min_delta: min_delta.abs(),
            best: f32::INFINITY,
            wait: 0,
            stopped_epoch: None,
        }
    }

    pub fn stopped_epoch(&self) -> Option<usize> {
        self.stopped_epoch
    }
}

impl Default for EarlyStopping {
    fn default() -> Self {
        Self::new(5, 0.0)
    }
}

impl Callback for EarlyStopping {
    fn name(&self) -> &'static str {
        "early_stopping"
    }

    fn on_epoch_end(&mut self, logs: &EpochLogs, _lr: f64) -> Action {
        let current = logs.monitored();
        if current < self.best - self.min_delta {
            self.best = current;
            self.wait = 0;
            return Action::Continue;
        }
        self.wait += 1;
        if self.wait >= self.patience {
            self.stopped_epoch = Some(logs.epoch);
            return Action::Stop;
        }
        Action::Continue
    }
}

/// Multiply the learning rate by `factor` once the monitored loss has not
/// improved for `patience` epochs, never going below `min_lr`.
#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    pub factor: f64,
    pub patience: usize,
    pub min_lr: f64,
    pub min_delta: f32,
    pub cooldown: usize,
    best: f32,
    wait: usize,
    cooldown_counter: usize,
}

impl ReduceLrOnPlateau {
    pub fn new(factor: f64, patience: usize, min_lr: f64) -> Self {
        Self {
            factor,
            patience,
            min_lr,
            min_delta: 1e-4,
            cooldown: 0,
            best: f32::INFINITY,
            wait: 0,
            cooldown_counter: 0,
        }
    }

    pub fn with_cooldown(mut self, cooldown: usize) -> Self {
        self.cooldown = cooldown;
        self
    }

    fn in_cooldown(&self) -> bool {
        self.cooldown_counter > 0
    }
}

impl Default for ReduceLrOnPlateau {
    fn default() -> Self {
        Self::new(0.2, 3, 1e-6)
    }
}

impl Callback for ReduceLrOnPlateau {
    fn name(&self) -> &'static str {
        "reduce_lr_on_plateau"
    }

    fn on_epoch_end(&mut self, logs: &EpochLogs, lr: f64) -> Action {
        let current = logs.monitored();
        if self.in_cooldown() {
            self.cooldown_counter -= 1;
            self.wait = 0;
        }

        if current < self.best - self.min_delta {
            self.best = current;
            self.wait = 0;
        } else if !self.in_cooldown() {
            self.wait += 1;
            if self.wait >= self.patience {
                self.wait = 0;
                if lr > self.min_lr {
                    let new_lr = (lr * self.factor).max(self.min_lr);
                    self.cooldown_counter = self.cooldown;
                    return Action::SetLearningRate(new_lr);
                }
            }
        }
        Action::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logs(epoch: usize, val_loss: f32) -> EpochLogs {
        EpochLogs {
            epoch,
            loss: 1.0,
            binary_accuracy: 0.5,
            val_loss: Some(val_loss),
            val_binary_accuracy: Some(0.5),
            lr: 1e-3,
        }
    }

    #[test]
    fn test_early_stopping_after_patience() {
        let mut cb = EarlyStopping::new(2, 0.0);
        let losses = [0.5, 0.4, 0.45, 0.4, 0.41];
        let actions: Vec<Action> = losses
            .iter()
            .enumerate()
            .map(|(i, &l)| cb.on_epoch_end(&logs(i + 1, l), 1e-3))
            .collect();

        // 0.4 again is not an improvement
        assert_eq!(
            actions,
            vec![Action::Continue, Action::Continue, Action::Continue, Action::Stop, Action::Stop]
        );
        assert_eq!(cb.stopped_epoch(), Some(5));
    }

    #[test]
    fn test_early_stopping_resets_on_improvement() {
        let mut cb = EarlyStopping::new(2, 0.0);
        assert_eq!(cb.on_epoch_end(&logs(1, 0.5), 1e-3), Action::Continue);
        assert_eq!(cb.on_epoch_end(&logs(2, 0.6), 1e-3), Action::Continue);
        assert_eq!(cb.on_epoch_end(&logs(3, 0.3), 1e-3), Action::Continue);
        assert_eq!(cb.on_epoch_end(&logs(4, 0.3), 1e-3), Action::Continue);
        assert_eq!(cb.on_epoch_end(&logs(5, 0.3), 1e-3), Action::Stop);
    }

    #[test]
    fn test_reduce_lr_on_plateau() {
        let mut cb = ReduceLrOnPlateau::new(0.2, 2, 1e-4);
        assert_eq!(cb.on_epoch_end(&logs(1, 0.5), 1e-3), Action::Continue);
        assert_eq!(cb.on_epoch_end(&logs(2, 0.49995), 1e-3), Action::Continue);
        match cb.on_epoch_end(&logs(3, 0.5), 1e-3) {
            Action::SetLearningRate(lr) => assert!((lr - 2e-4).abs() < 1e-12),
            other => panic!("expected a reduction, got {other:?}"),
        }

        // floored at min_lr
        assert_eq!(cb.on_epoch_end(&logs(4, 0.5), 2e-4), Action::Continue);
        match cb.on_epoch_end(&logs(5, 0.5), 2e-4) {
            Action::SetLearningRate(lr) => assert!((lr - 1e-4).abs() < 1e-12),
            other => panic!("expected a reduction, got {other:?}"),
        }

        // nothing left to reduce
        assert_eq!(cb.on_epoch_end(&logs(6, 0.5), 1e-4), Action::Continue);
        assert_eq!(cb.on_epoch_end(&logs(7, 0.5), 1e-4), Action::Continue);
    }

    #[test]
    fn test_callbacks_are_named() {
        let callbacks: Vec<Box<dyn Callback>> = vec![
            Box::new(EarlyStopping::default()),
            Box::new(ReduceLrOnPlateau::default()),
        ];
        let names: Vec<&str> = callbacks.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["early_stopping", "reduce_lr_on_plateau"]);
    }

    #[test]
    fn test_reduce_lr_cooldown() {
        let mut cb = ReduceLrOnPlateau::new(0.5, 1, 0.0).with_cooldown(2);
        assert_eq!(cb.on_epoch_end(&logs(1, 0.5), 1.0), Action::Continue);
        assert_eq!(cb.on_epoch_end(&logs(2, 0.5), 1.0), Action::SetLearningRate(0.5));
        // cooling down
        assert_eq!(cb.on_epoch_end(&logs(3, 0.5), 0.5), Action::Continue);
        assert_eq!(cb.on_epoch_end(&logs(4, 0.5), 0.5), Action::SetLearningRate(0.25));
    }
}
