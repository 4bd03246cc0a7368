//! Fault-injecting send policy shared by every SummarySender: drop,
//! duplicate, and reorder decisions driven by the configured
//! PercentageOfLost/PercentageOfDuplicated/DuplicatedNumber.

use rand::Rng;

/// What a single send attempt should do, decided independently per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPlan {
    /// Simulated transport loss; nothing is sent.
    Dropped,
    /// One copy, sent normally.
    Single,
    /// Duplication triggered: send `extra + 1` copies total.
    Duplicated(u32),
}

#[derive(Debug, Clone, Copy)]
pub struct FaultInjector {
    percentage_of_lost: u8,
    percentage_of_duplicated: u8,
    duplicated_number: u32,
}

impl FaultInjector {
    pub fn new(percentage_of_lost: u8, percentage_of_duplicated: u8, duplicated_number: u32) -> Self {
        Self {
            percentage_of_lost,
            percentage_of_duplicated,
            duplicated_number,
        }
    }

    pub fn from_config(cfg: &crate::config::Config) -> Self {
        Self::new(
            cfg.percentage_of_lost,
            cfg.percentage_of_duplicated,
            cfg.duplicated_number,
        )
    }

    /// Decide this attempt's fate: drop with `percentage_of_lost`/100, else
    /// duplicate with `percentage_of_duplicated`/100, else send once.
    pub fn plan(&self) -> SendPlan {
        let mut rng = rand::thread_rng();
        if rng.gen_range(0..100) < self.percentage_of_lost as u32 {
            return SendPlan::Dropped;
        }
        if rng.gen_range(0..100) < self.percentage_of_duplicated as u32 {
            return SendPlan::Duplicated(self.duplicated_number);
        }
        SendPlan::Single
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_percent_always_sends_once() {
        let fault = FaultInjector::new(0, 0, 5);
        for _ in 0..50 {
            assert_eq!(fault.plan(), SendPlan::Single);
        }
    }

    #[test]
    fn hundred_percent_loss_always_drops() {
        let fault = FaultInjector::new(100, 100, 2);
        for _ in 0..50 {
            assert_eq!(fault.plan(), SendPlan::Dropped);
        }
    }

    #[test]
    fn hundred_percent_duplication_without_loss_always_duplicates() {
        let fault = FaultInjector::new(0, 100, 3);
        for _ in 0..50 {
            assert_eq!(fault.plan(), SendPlan::Duplicated(3));
        }
    }
}
