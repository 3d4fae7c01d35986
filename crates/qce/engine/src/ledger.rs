//! Append-only run ledger of execution records.

use parking_lot::Mutex;
use qce_types::ExecutionRecord;

#[derive(Debug, Default)]
pub struct RunLedger {
    records: Mutex<Vec<ExecutionRecord>>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: ExecutionRecord) {
        self.records.lock().push(record);
    }

    /// Copy of every record appended so far, in append order.
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn successful(&self) -> usize {
        self.records.lock().iter().filter(|r| r.success).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_count() {
        let ledger = RunLedger::new();
        assert!(ledger.is_empty());

        let mut ok = ExecutionRecord::begin("D1Q1");
        ok.finish(true);
        let mut failed = ExecutionRecord::begin("D1Q2");
        failed.finish(false);
        ledger.append(ok);
        ledger.append(failed);

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.successful(), 1);
        let ids: Vec<String> = ledger.records().into_iter().map(|r| r.question_id).collect();
        assert_eq!(ids, ["D1Q1", "D1Q2"]);
    }
}
