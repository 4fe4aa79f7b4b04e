use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::device::DeviceState;
use super::physics::{add_noise, low_pass, luminescence_readings, DAMPING, TEMPERATURE_NOISE};
use crate::config::SimulationConfig;
use crate::error::{ResolutionError, WriteError};
use crate::sink::{AddressableKey, DeviceNode, NodeTable, PublishedValue, VariableSink};

pub const UPDATE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Values produced by one tick. Handed to the sink and then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedSample {
    pub temperature: f64,
    pub readings: Vec<f64>,
}

/// Periodic task that advances the device simulation and publishes the
/// resulting sensor values.
///
/// `run` consumes the loop; once stopped it cannot be restarted.
pub struct SensorUpdateLoop<S, R> {
    state: DeviceState,
    sink: S,
    rng: R,
    temperature_key: AddressableKey,
    readings_key: AddressableKey,
    target_key: AddressableKey,
    enabled_key: AddressableKey,
    interval: Duration,
    loop_state: LoopState,
}

impl<S, R> SensorUpdateLoop<S, R>
where
    S: VariableSink,
    R: Rng,
{
    pub fn new(state: DeviceState, sink: S, nodes: &NodeTable, rng: R) -> Self {
        Self {
            state,
            sink,
            rng,
            temperature_key: nodes.key(DeviceNode::TemperatureCurrentValue),
            readings_key: nodes.key(DeviceNode::LuminescenceReadings),
            target_key: nodes.key(DeviceNode::TemperatureTargetValue),
            enabled_key: nodes.key(DeviceNode::TemperatureIsEnabled),
            interval: UPDATE_INTERVAL,
            loop_state: LoopState::Running,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Report the controller's target and on/off switch so the published
    /// model matches the state the filter tracks.
    fn publish_setpoints(&self) -> Result<(), WriteError> {
        self.sink.write_value(
            &self.target_key,
            PublishedValue::Scalar(self.state.target_temperature()),
        )?;
        self.sink.write_value(
            &self.enabled_key,
            PublishedValue::Flag(self.state.controller_enabled()),
        )
    }

    /// Advance the filter one step and draw this tick's noisy outputs.
    fn advance(&mut self) -> PublishedSample {
        let setpoint = self.state.effective_setpoint();
        self.state.current_temperature = low_pass(self.state.current_temperature, setpoint, DAMPING);

        // noise goes to the published copy only, never back into the filter
        let temperature = add_noise(&mut self.rng, self.state.current_temperature(), TEMPERATURE_NOISE);
        let readings = luminescence_readings(&mut self.rng);

        PublishedSample {
            temperature,
            readings,
        }
    }

    fn publish(&self, sample: PublishedSample) {
        if let Err(e) = self
            .sink
            .write_value(&self.temperature_key, PublishedValue::Scalar(sample.temperature))
        {
            tracing::warn!("Failed to publish temperature: {}", e);
        }
        if let Err(e) = self
            .sink
            .write_value(&self.readings_key, PublishedValue::Array(sample.readings))
        {
            tracing::warn!("Failed to publish luminescence readings: {}", e);
        }
    }

    /// One loop iteration: simulate, then publish. Write failures are logged
    /// and swallowed.
    pub fn tick(&mut self) -> f64 {
        let sample = self.advance();
        let temperature = sample.temperature;
        self.publish(sample);
        tracing::info!("Temperature: {:.3}", temperature);
        temperature
    }

    pub async fn run(mut self, token: CancellationToken) -> LoopState {
        if token.is_cancelled() {
            self.loop_state = LoopState::Stopped;
            return self.loop_state;
        }

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("Background worker started");
        if let Err(e) = self.publish_setpoints() {
            tracing::warn!("Failed to publish temperature controller setpoints: {}", e);
        }

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }

        self.loop_state = LoopState::Stopped;
        tracing::info!("Background worker shutting down");
        self.loop_state
    }
}

impl<S, R> SensorUpdateLoop<S, R>
where
    S: VariableSink + 'static,
    R: Rng + Send + 'static,
{
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<LoopState> {
        tokio::spawn(self.run(token))
    }
}

/// Resolve every node the simulation addresses, then spawn the loop.
///
/// Nothing is written and no task is started when resolution fails.
pub fn start<S>(
    sink: S,
    namespace_uri: &str,
    simulation: &SimulationConfig,
    token: CancellationToken,
) -> Result<JoinHandle<LoopState>, ResolutionError>
where
    S: VariableSink + 'static,
{
    let nodes = NodeTable::resolve(&sink, namespace_uri)?;

    let state = DeviceState::initialize(simulation.target_temperature, simulation.controller_enabled);
    let rng = match simulation.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    Ok(SensorUpdateLoop::new(state, sink, &nodes, rng)
        .with_interval(simulation.update_interval())
        .spawn(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::memory::MemorySink;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    const NS: &str = "http://spectaris.de/LuminescenceReader/";

    fn sink() -> Arc<MemorySink> {
        Arc::new(MemorySink::with_namespace(
            NS,
            DeviceNode::ALL.iter().map(|n| n.numeric_id()),
        ))
    }

    fn build(state: DeviceState, sink: Arc<MemorySink>, seed: u64) -> SensorUpdateLoop<Arc<MemorySink>, StdRng> {
        let nodes = NodeTable::resolve(&*sink, NS).unwrap();
        SensorUpdateLoop::new(state, sink, &nodes, StdRng::seed_from_u64(seed))
    }

    fn temperature_key() -> AddressableKey {
        AddressableKey::new(1, DeviceNode::TemperatureCurrentValue.numeric_id())
    }

    #[test]
    fn test_tick_follows_worked_example() {
        let mut sensors = build(DeviceState::default(), sink(), 1);
        sensors.tick();
        assert!((sensors.state.current_temperature - 27.4).abs() < 1e-9);
        sensors.tick();
        assert!((sensors.state.current_temperature - 28.92).abs() < 1e-9);
    }

    #[test]
    fn test_published_temperature_within_noise_band() {
        let store = sink();
        let mut sensors = build(DeviceState::default(), store.clone(), 5);
        for _ in 0..500 {
            let published = sensors.tick();
            assert!((published - sensors.state.current_temperature).abs() <= 0.1);
            assert_eq!(store.value(&temperature_key()), Some(PublishedValue::Scalar(published)));
        }
    }

    #[test]
    fn test_noise_does_not_feed_back_into_state() {
        let mut a = build(DeviceState::default(), sink(), 1);
        let mut b = build(DeviceState::default(), sink(), 2);
        for _ in 0..25 {
            let pa = a.tick();
            let pb = b.tick();
            assert_ne!(pa, pb);
            assert_eq!(a.state.current_temperature, b.state.current_temperature);
        }
    }

    #[test]
    fn test_disabled_controller_settles_at_ambient() {
        let mut state = DeviceState::initialize(80.0, false);
        state.current_temperature = 50.0;
        let mut sensors = build(state, sink(), 3);
        for _ in 0..100 {
            sensors.tick();
        }
        assert!((sensors.state.current_temperature - 25.0).abs() < 1e-6);
    }

    #[test]
    fn test_readings_published_each_tick() {
        let store = sink();
        let mut sensors = build(DeviceState::default(), store.clone(), 9);
        sensors.tick();
        let key = AddressableKey::new(1, DeviceNode::LuminescenceReadings.numeric_id());
        match store.value(&key) {
            Some(PublishedValue::Array(values)) => assert_eq!(values.len(), 96),
            other => panic!("unexpected readings value: {:?}", other),
        }
    }

    #[test]
    fn test_write_failure_does_not_stop_simulation() {
        let store = sink();
        store.fail_writes.store(true, Ordering::SeqCst);
        let mut sensors = build(DeviceState::default(), store.clone(), 4);
        sensors.tick();
        sensors.tick();
        assert_eq!(store.write_count(), 0);
        assert!((sensors.state.current_temperature - 28.92).abs() < 1e-9);

        store.fail_writes.store(false, Ordering::SeqCst);
        sensors.tick();
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_writes_and_joins() {
        let store = sink();
        let token = CancellationToken::new();
        let handle = build(DeviceState::default(), store.clone(), 11).spawn(token.clone());

        // setpoints once, then ticks at 0ms, 500ms and 1000ms
        tokio::time::sleep(Duration::from_millis(1250)).await;
        token.cancel();
        assert_eq!(handle.await.unwrap(), LoopState::Stopped);

        let writes = store.write_count();
        assert_eq!(writes, 8);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_survives_failing_sink() {
        let store = sink();
        store.fail_writes.store(true, Ordering::SeqCst);
        let token = CancellationToken::new();
        let handle = build(DeviceState::default(), store.clone(), 12).spawn(token.clone());

        tokio::time::sleep(Duration::from_millis(1250)).await;
        assert!(!handle.is_finished());
        assert_eq!(store.write_count(), 0);

        store.fail_writes.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(store.write_count() > 0);

        token.cancel();
        assert_eq!(handle.await.unwrap(), LoopState::Stopped);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_never_writes() {
        let store = sink();
        let token = CancellationToken::new();
        token.cancel();
        let state = build(DeviceState::default(), store.clone(), 13).run(token).await;
        assert_eq!(state, LoopState::Stopped);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_setpoints_follow_initial_state() {
        let store = sink();
        let token = CancellationToken::new();
        let handle = build(DeviceState::initialize(60.0, false), store.clone(), 14).spawn(token.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
        handle.await.unwrap();

        let target = AddressableKey::new(1, DeviceNode::TemperatureTargetValue.numeric_id());
        let enabled = AddressableKey::new(1, DeviceNode::TemperatureIsEnabled.numeric_id());
        assert_eq!(store.value(&target), Some(PublishedValue::Scalar(60.0)));
        assert_eq!(store.value(&enabled), Some(PublishedValue::Flag(false)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_publishes_configured_device() {
        let store = sink();
        let token = CancellationToken::new();
        let simulation = SimulationConfig {
            target_temperature: 42.0,
            controller_enabled: true,
            seed: Some(21),
            ..SimulationConfig::default()
        };
        let handle = start(store.clone(), NS, &simulation, token.clone()).unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        token.cancel();
        assert_eq!(handle.await.unwrap(), LoopState::Stopped);

        let target = AddressableKey::new(1, DeviceNode::TemperatureTargetValue.numeric_id());
        assert_eq!(store.value(&target), Some(PublishedValue::Scalar(42.0)));
        match store.value(&temperature_key()) {
            // 0.8 * 25 + 0.2 * 42 = 28.4, plus at most 0.1 of noise
            Some(PublishedValue::Scalar(t)) => assert!((t - 28.4).abs() <= 0.1),
            other => panic!("unexpected temperature value: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_start_fails_on_unresolved_node_without_writes() {
        let ids = DeviceNode::ALL
            .iter()
            .map(|n| n.numeric_id())
            .filter(|id| *id != DeviceNode::TemperatureCurrentValue.numeric_id());
        let store = Arc::new(MemorySink::with_namespace(NS, ids));
        let token = CancellationToken::new();

        let err = start(store.clone(), NS, &SimulationConfig::default(), token).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::UnknownNode(AddressableKey::new(1, DeviceNode::TemperatureCurrentValue.numeric_id()))
        );

        tokio::task::yield_now().await;
        assert_eq!(store.write_count(), 0);
    }
}
