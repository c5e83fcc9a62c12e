use std::io;

use em_core::ModelParams;

/// Consumer of per-iteration parameter snapshots.
///
/// Called once per iteration by the designated recorder (rank 0), so a
/// durable sink never sees duplicate writes. Durable storage is the
/// implementation's concern.
pub trait ResultsSink: Send {
    /// Records the authoritative parameters and bound of one iteration.
    ///
    /// # Errors
    /// I/O failures are escalated and end the run.
    fn record_iteration(
        &mut self,
        iteration: usize,
        params: &ModelParams,
        bound: f64,
    ) -> io::Result<()>;
}

/// One recorded iteration.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub iteration: usize,
    pub bound: f64,
    /// Named flat parameter values, as `ModelParams::symbols` lays them out.
    pub symbols: Vec<(&'static str, Vec<f64>)>,
}

/// Keeps every snapshot in memory; the in-process stand-in for a
/// hierarchical results file.
#[derive(Debug, Default)]
pub struct MemorySink {
    snapshots: Vec<Snapshot>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn last(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }
}

impl ResultsSink for MemorySink {
    fn record_iteration(
        &mut self,
        iteration: usize,
        params: &ModelParams,
        bound: f64,
    ) -> io::Result<()> {
        self.snapshots.push(Snapshot {
            iteration,
            bound,
            symbols: params.symbols(),
        });
        Ok(())
    }
}

/// Discards every snapshot.
#[derive(Debug, Default)]
pub struct NullSink;

impl ResultsSink for NullSink {
    fn record_iteration(&mut self, _: usize, _: &ModelParams, _: f64) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn memory_sink_keeps_iteration_order() {
        let params = ModelParams::new(Array2::zeros((2, 2)), 0.3, 1.0);
        let mut sink = MemorySink::new();

        sink.record_iteration(1, &params, -10.0).unwrap();
        sink.record_iteration(2, &params, -9.0).unwrap();

        assert_eq!(sink.snapshots().len(), 2);
        assert_eq!(sink.last().unwrap().iteration, 2);
        assert_eq!(sink.last().unwrap().bound, -9.0);
        assert_eq!(sink.last().unwrap().symbols[1].0, "pi");
    }
}
