//! Bounded batch execution with per-stage output capture

use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

use sluice_core::metrics::processing_timer_name;
use sluice_core::{
    BadRecordsHandler, BatchListener, MetricRegistry, Observer, OffsetTracker, Pipe, PipeBatch,
    PipelineRunner, Result, RuntimeInfo, StageOutput, StatsAggregationHandler,
};

use crate::config::PreviewConfig;

/// Preview variant of the pipeline runner.
///
/// Runs exactly the configured number of batches, regardless of
/// end-of-source signals, and accumulates one output snapshot per batch.
/// Downstream pipes are organized as a collection of chains, but preview
/// executes a single active chain (the first one); `destroy` still releases
/// every chain. Bad-record and stats-aggregation handlers are accepted but
/// never invoked in this variant.
pub struct PreviewPipelineRunner {
    config: PreviewConfig,
    runtime_info: RuntimeInfo,
    tracker: Box<dyn OffsetTracker>,
    metrics: MetricRegistry,
    timer_name: String,
    batches_output: Vec<Vec<StageOutput>>,
    source_offset: Option<String>,
    new_source_offset: Option<String>,
}

impl PreviewPipelineRunner {
    /// Create a runner. The configuration is assumed to have passed
    /// [`PreviewConfig::validate`].
    pub fn new(
        config: PreviewConfig,
        runtime_info: RuntimeInfo,
        tracker: Box<dyn OffsetTracker>,
    ) -> Self {
        let timer_name = processing_timer_name(&config.name, &config.rev);
        let mut metrics = MetricRegistry::new();
        metrics.timer(&timer_name);

        Self {
            config,
            runtime_info,
            tracker,
            metrics,
            timer_name,
            batches_output: Vec::new(),
            source_offset: None,
            new_source_offset: None,
        }
    }

    /// The configuration this runner was created with
    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }
}

impl PipelineRunner for PreviewPipelineRunner {
    fn is_preview(&self) -> bool {
        true
    }

    fn runtime_info(&self) -> &RuntimeInfo {
        &self.runtime_info
    }

    fn metrics(&self) -> &MetricRegistry {
        &self.metrics
    }

    fn run(
        &mut self,
        origin: &mut Pipe,
        chains: &mut [Vec<Pipe>],
        bad_records: &mut dyn BadRecordsHandler,
        stats: &mut dyn StatsAggregationHandler,
    ) -> Result<()> {
        self.run_with_overrides(origin, chains, bad_records, Vec::new(), stats)
    }

    fn run_with_overrides(
        &mut self,
        origin: &mut Pipe,
        chains: &mut [Vec<Pipe>],
        _bad_records: &mut dyn BadRecordsHandler,
        overrides: Vec<StageOutput>,
        _stats: &mut dyn StatsAggregationHandler,
    ) -> Result<()> {
        // Last-write-wins when the caller supplies duplicate overrides for
        // one instance name.
        let mut override_map: HashMap<String, StageOutput> = HashMap::new();
        for output in overrides {
            override_map.insert(output.instance().to_string(), output);
        }

        for index in 0..self.config.batches {
            let mut batch = PipeBatch::new(self.tracker.as_ref(), self.config.batch_size, true);
            let start = Instant::now();
            self.source_offset = batch.previous_offset().map(str::to_owned);
            debug!(batch = index, offset = ?self.source_offset, "starting preview batch");

            match override_map.get(origin.instance_name()) {
                Some(output) => batch.override_stage_output(origin, output.clone())?,
                None => origin.process(&mut batch).map_err(|e| e.in_batch(index))?,
            }

            // Preview executes a single active chain; the remaining chains
            // are only ever destroyed.
            if let Some(chain) = chains.first_mut() {
                for pipe in chain.iter_mut() {
                    match override_map.get(pipe.instance_name()) {
                        Some(_) if pipe.kind().always_executes() => {
                            pipe.process(&mut batch).map_err(|e| e.in_batch(index))?;
                        }
                        Some(output) => {
                            batch.override_stage_output(pipe, output.clone())?;
                        }
                        None if self.config.skip_targets && pipe.stage_type().is_terminal() => {
                            batch.skip_stage(pipe);
                        }
                        None => {
                            pipe.process(&mut batch).map_err(|e| e.in_batch(index))?;
                        }
                    }
                }
            }

            if let Some(offset) = batch.new_offset() {
                self.tracker.set_offset(Some(offset.to_owned()));
            }
            self.tracker.commit();
            self.metrics.timer(&self.timer_name).update(start.elapsed());
            self.new_source_offset = self.tracker.offset();
            self.batches_output.push(batch.snapshot());
        }
        Ok(())
    }

    fn destroy(
        &mut self,
        origin: &mut Pipe,
        chains: &mut [Vec<Pipe>],
        _bad_records: &mut dyn BadRecordsHandler,
        _stats: &mut dyn StatsAggregationHandler,
    ) -> Result<()> {
        // Destroy the origin on its own.
        let mut batch = PipeBatch::new(self.tracker.as_ref(), self.config.batch_size, true);
        origin.destroy(&mut batch)?;

        // Then every chain independently, with the origin marked skipped.
        // Chains that never processed a batch are released all the same.
        for chain in chains.iter_mut() {
            let mut batch = PipeBatch::new(self.tracker.as_ref(), self.config.batch_size, true);
            batch.skip_stage(origin);
            for pipe in chain.iter_mut() {
                pipe.destroy(&mut batch)?;
            }
        }
        debug!("preview pipeline destroyed");
        Ok(())
    }

    fn batches_output(&self) -> &[Vec<StageOutput>] {
        &self.batches_output
    }

    fn source_offset(&self) -> Option<&str> {
        self.source_offset.as_deref()
    }

    fn new_source_offset(&self) -> Option<&str> {
        self.new_source_offset.as_deref()
    }

    fn set_observer(&mut self, _observer: Box<dyn Observer>) {
        // Reserved for the production runner variant.
    }

    fn register_listener(&mut self, _listener: Box<dyn BatchListener>) {
        // Reserved for the production runner variant.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offset::PreviewOffsetTracker;
    use serde_json::json;
    use sluice_core::{
        DiscardBadRecords, DiscardStats, Error, Lanes, Record, Stage, StageType,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use test_case::test_case;

    #[derive(Clone, Default)]
    struct Counters {
        processed: Arc<AtomicUsize>,
        destroyed: Arc<AtomicUsize>,
    }

    impl Counters {
        fn processed(&self) -> usize {
            self.processed.load(Ordering::SeqCst)
        }

        fn destroyed(&self) -> usize {
            self.destroyed.load(Ordering::SeqCst)
        }
    }

    struct TestStage {
        name: String,
        ty: StageType,
        counters: Counters,
        fail_on_call: Option<usize>,
    }

    impl Stage for TestStage {
        fn instance_name(&self) -> &str {
            &self.name
        }

        fn stage_type(&self) -> StageType {
            self.ty
        }

        fn process(&mut self, batch: &mut PipeBatch) -> sluice_core::Result<Lanes> {
            let call = self.counters.processed.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_call == Some(call) {
                return Err(Error::stage(&self.name, "boom"));
            }
            if self.ty == StageType::Origin {
                batch.set_new_offset(Some(format!("{}-{}", self.name, call + 1)));
            }
            let mut lanes = Lanes::new();
            lanes.insert(
                "out".to_string(),
                vec![Record::new(format!("{}::{call}", self.name), json!({ "call": call }))],
            );
            Ok(lanes)
        }

        fn destroy(&mut self) -> sluice_core::Result<()> {
            self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn stage(name: &str, ty: StageType, counters: &Counters) -> Box<dyn Stage> {
        Box::new(TestStage {
            name: name.to_string(),
            ty,
            counters: counters.clone(),
            fail_on_call: None,
        })
    }

    fn failing_stage(name: &str, ty: StageType, counters: &Counters, call: usize) -> Box<dyn Stage> {
        Box::new(TestStage {
            name: name.to_string(),
            ty,
            counters: counters.clone(),
            fail_on_call: Some(call),
        })
    }

    fn runner(batches: usize, skip_targets: bool) -> PreviewPipelineRunner {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let config = PreviewConfig {
            batches,
            batch_size: 10,
            skip_targets,
            ..Default::default()
        };
        PreviewPipelineRunner::new(
            config,
            RuntimeInfo::new("test-env"),
            Box::new(PreviewOffsetTracker::new(Some("start".to_string()))),
        )
    }

    fn snapshot_names(snapshot: &[StageOutput]) -> Vec<&str> {
        snapshot.iter().map(StageOutput::instance).collect()
    }

    #[test_case(0)]
    #[test_case(1)]
    #[test_case(3)]
    fn test_run_produces_one_snapshot_per_batch(batches: usize) {
        let counters = Counters::default();
        let mut origin = Pipe::plain(stage("origin_1", StageType::Origin, &counters));
        let mut chains = vec![vec![Pipe::plain(stage("proc_1", StageType::Processor, &counters))]];

        let mut runner = runner(batches, false);
        runner
            .run(&mut origin, &mut chains, &mut DiscardBadRecords, &mut DiscardStats)
            .unwrap();

        assert_eq!(runner.batches_output().len(), batches);
        for snapshot in runner.batches_output() {
            assert_eq!(snapshot_names(snapshot), vec!["origin_1", "proc_1"]);
        }
    }

    #[test]
    fn test_two_batches_capture_origin_and_target_with_advancing_offsets() {
        let counters = Counters::default();
        let target_counters = Counters::default();
        let mut origin = Pipe::plain(stage("origin_1", StageType::Origin, &counters));
        let mut chains =
            vec![vec![Pipe::plain(stage("target_1", StageType::Target, &target_counters))]];

        let mut runner = runner(2, false);
        runner
            .run(&mut origin, &mut chains, &mut DiscardBadRecords, &mut DiscardStats)
            .unwrap();

        assert_eq!(runner.batches_output().len(), 2);
        for snapshot in runner.batches_output() {
            assert_eq!(snapshot.len(), 2);
            assert_eq!(snapshot_names(snapshot), vec!["origin_1", "target_1"]);
        }

        // source_offset reflects the start of the last batch, not the run.
        assert_eq!(runner.source_offset(), Some("origin_1-1"));
        assert_eq!(runner.new_source_offset(), Some("origin_1-2"));
    }

    #[test]
    fn test_skip_targets_suppresses_terminal_stages() {
        let counters = Counters::default();
        let target_counters = Counters::default();
        let mut origin = Pipe::plain(stage("origin_1", StageType::Origin, &counters));
        let mut chains = vec![vec![
            Pipe::plain(stage("proc_1", StageType::Processor, &counters)),
            Pipe::plain(stage("target_1", StageType::Target, &target_counters)),
        ]];

        let mut runner = runner(1, true);
        runner
            .run(&mut origin, &mut chains, &mut DiscardBadRecords, &mut DiscardStats)
            .unwrap();

        assert_eq!(snapshot_names(&runner.batches_output()[0]), vec!["origin_1", "proc_1"]);
        assert_eq!(target_counters.processed(), 0);
    }

    #[test]
    fn test_origin_override_bypasses_execution() {
        let counters = Counters::default();
        let mut origin = Pipe::plain(stage("origin_1", StageType::Origin, &counters));
        let mut chains = vec![vec![Pipe::plain(stage("proc_1", StageType::Processor, &counters))]];

        let supplied = StageOutput::single_lane(
            "origin_1",
            "out",
            vec![Record::new("replay::0", json!({"replayed": true}))],
        );
        let mut runner = runner(1, false);
        runner
            .run_with_overrides(
                &mut origin,
                &mut chains,
                &mut DiscardBadRecords,
                vec![supplied.clone()],
                &mut DiscardStats,
            )
            .unwrap();

        assert_eq!(runner.batches_output()[0][0], supplied);
        // The origin never ran, so the offset never advanced.
        assert_eq!(runner.new_source_offset(), Some("start"));
    }

    #[test]
    fn test_plain_stage_override_bypasses_processing() {
        let counters = Counters::default();
        let proc_counters = Counters::default();
        let mut origin = Pipe::plain(stage("origin_1", StageType::Origin, &counters));
        let mut chains = vec![vec![Pipe::plain(stage("proc_1", StageType::Processor, &proc_counters))]];

        let supplied = StageOutput::single_lane("proc_1", "out", vec![]);
        let mut runner = runner(2, false);
        runner
            .run_with_overrides(
                &mut origin,
                &mut chains,
                &mut DiscardBadRecords,
                vec![supplied.clone()],
                &mut DiscardStats,
            )
            .unwrap();

        assert_eq!(proc_counters.processed(), 0);
        for snapshot in runner.batches_output() {
            assert_eq!(snapshot[1], supplied);
        }
    }

    #[test]
    fn test_observer_and_multiplexer_ignore_overrides() {
        let counters = Counters::default();
        let obs_counters = Counters::default();
        let mux_counters = Counters::default();
        let mut origin = Pipe::plain(stage("origin_1", StageType::Origin, &counters));
        let mut chains = vec![vec![
            Pipe::observer(stage("obs_1", StageType::Processor, &obs_counters)),
            Pipe::multiplexer(stage("mux_1", StageType::Processor, &mux_counters)),
        ]];

        let overrides = vec![
            StageOutput::single_lane("obs_1", "out", vec![]),
            StageOutput::single_lane("mux_1", "out", vec![]),
        ];
        let mut runner = runner(1, false);
        runner
            .run_with_overrides(
                &mut origin,
                &mut chains,
                &mut DiscardBadRecords,
                overrides,
                &mut DiscardStats,
            )
            .unwrap();

        assert_eq!(obs_counters.processed(), 1);
        assert_eq!(mux_counters.processed(), 1);

        // The captured outputs are what the pipes produced, not the
        // supplied (empty) overrides.
        let snapshot = &runner.batches_output()[0];
        assert_eq!(snapshot[1].record_count(), 1);
        assert_eq!(snapshot[2].record_count(), 1);
    }

    #[test]
    fn test_overridden_observer_over_terminal_stage_executes_despite_skip_targets() {
        // Observation logic layered over a terminal stage is not the
        // stage's real computation: an override for its identity does not
        // suppress it, and neither does skip-targets.
        let counters = Counters::default();
        let obs_counters = Counters::default();
        let mut origin = Pipe::plain(stage("origin_1", StageType::Origin, &counters));
        let mut chains = vec![vec![Pipe::observer(stage(
            "obs_target_1",
            StageType::Target,
            &obs_counters,
        ))]];

        let mut runner = runner(1, true);
        runner
            .run_with_overrides(
                &mut origin,
                &mut chains,
                &mut DiscardBadRecords,
                vec![StageOutput::single_lane("obs_target_1", "out", vec![])],
                &mut DiscardStats,
            )
            .unwrap();

        assert_eq!(obs_counters.processed(), 1);
        let snapshot = &runner.batches_output()[0];
        assert_eq!(snapshot_names(snapshot), vec!["origin_1", "obs_target_1"]);
        // The pipe's own output was captured, not the supplied override.
        assert_eq!(snapshot[1].record_count(), 1);
    }

    #[test]
    fn test_stage_failure_aborts_and_keeps_prior_snapshots() {
        let counters = Counters::default();
        let flaky_counters = Counters::default();
        let mut origin = Pipe::plain(stage("origin_1", StageType::Origin, &counters));
        let mut chains = vec![vec![Pipe::plain(failing_stage(
            "flaky_1",
            StageType::Processor,
            &flaky_counters,
            1,
        ))]];

        let mut runner = runner(3, false);
        let err = runner
            .run(&mut origin, &mut chains, &mut DiscardBadRecords, &mut DiscardStats)
            .unwrap_err();

        assert_eq!(err.failing_stage(), Some("flaky_1"));
        assert_eq!(err.batch_index(), Some(1));
        assert_eq!(runner.batches_output().len(), 1);
    }

    #[test]
    fn test_only_first_chain_executes() {
        let counters = Counters::default();
        let second_chain = Counters::default();
        let mut origin = Pipe::plain(stage("origin_1", StageType::Origin, &counters));
        let mut chains = vec![
            vec![Pipe::plain(stage("proc_1", StageType::Processor, &counters))],
            vec![Pipe::plain(stage("proc_2", StageType::Processor, &second_chain))],
        ];

        let mut runner = runner(2, false);
        runner
            .run(&mut origin, &mut chains, &mut DiscardBadRecords, &mut DiscardStats)
            .unwrap();

        assert_eq!(second_chain.processed(), 0);
        for snapshot in runner.batches_output() {
            assert_eq!(snapshot_names(snapshot), vec!["origin_1", "proc_1"]);
        }
    }

    #[test]
    fn test_run_without_chains_captures_origin_only() {
        let counters = Counters::default();
        let mut origin = Pipe::plain(stage("origin_1", StageType::Origin, &counters));

        let mut runner = runner(2, false);
        runner
            .run(&mut origin, &mut [], &mut DiscardBadRecords, &mut DiscardStats)
            .unwrap();

        assert_eq!(runner.batches_output().len(), 2);
        for snapshot in runner.batches_output() {
            assert_eq!(snapshot_names(snapshot), vec!["origin_1"]);
        }
    }

    #[test]
    fn test_destroy_releases_origin_and_every_chain_without_a_run() {
        let origin_counters = Counters::default();
        let chain_counters: Vec<Counters> = (0..3).map(|_| Counters::default()).collect();
        let mut origin = Pipe::plain(stage("origin_1", StageType::Origin, &origin_counters));
        let mut chains: Vec<Vec<Pipe>> = chain_counters
            .iter()
            .enumerate()
            .map(|(i, c)| {
                vec![
                    Pipe::plain(stage(&format!("proc_{i}"), StageType::Processor, c)),
                    Pipe::plain(stage(&format!("target_{i}"), StageType::Target, c)),
                ]
            })
            .collect();

        let mut runner = runner(2, false);
        runner
            .destroy(&mut origin, &mut chains, &mut DiscardBadRecords, &mut DiscardStats)
            .unwrap();

        assert_eq!(origin_counters.destroyed(), 1);
        assert_eq!(origin_counters.processed(), 0);
        for counters in &chain_counters {
            // Two pipes per chain, one destroy call each.
            assert_eq!(counters.destroyed(), 2);
            assert_eq!(counters.processed(), 0);
        }
    }

    #[test]
    fn test_processing_timer_records_every_batch() {
        let counters = Counters::default();
        let mut origin = Pipe::plain(stage("origin_1", StageType::Origin, &counters));

        let mut runner = runner(3, false);
        runner
            .run(&mut origin, &mut [], &mut DiscardBadRecords, &mut DiscardStats)
            .unwrap();

        assert!(runner.is_preview());
        let name = processing_timer_name(&runner.config().name, &runner.config().rev);
        assert_eq!(runner.metrics().get_timer(&name).unwrap().count(), 3);
    }
}
