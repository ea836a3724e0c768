// ── Rule synchronizer ──
//
// Orchestrates the bridge: resolves managed descriptors to live firewall
// rules, announces them as switches, republishes state, turns inbound
// commands into firewall patches and drives the republish protocol.
// Firewall rules are fetched per operation and never cached.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use pfmqtt_api::{BusEvent, ConfigPatch, FilterRule};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::CoreError;
use crate::gateway::{BusGateway, Delivery, FirewallGateway};
use crate::model::{Availability, DeviceId, SwitchDiscovery, SwitchState};
use crate::registry::IdentityRegistry;
use crate::republish::RepublishSession;
use crate::rules::{fetch_rules, select_rules};
use crate::topics::{self, DeviceTopics};

/// How the process is going down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownKind {
    /// Signal-initiated exit: devices are marked offline first.
    Clean,
    /// Fault exit: skip the availability flush.
    Crash,
}

// ── Synchronizer ─────────────────────────────────────────────────────

/// The bridge's single state object.
///
/// Cheaply cloneable via `Arc`. Connection flag, republish session and
/// identity registry live here rather than in ambient state, and every
/// event handler receives them through `self`.
pub struct Synchronizer<F, B> {
    inner: Arc<Inner<F, B>>,
}

struct Inner<F, B> {
    config: SyncConfig,
    registry: IdentityRegistry,
    firewall: F,
    bus: B,
    connected: AtomicBool,
    republish: Mutex<RepublishSession>,
    cancel: CancellationToken,
}

impl<F, B> Clone for Synchronizer<F, B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: FirewallGateway, B: BusGateway> Synchronizer<F, B> {
    pub fn new(config: SyncConfig, registry: IdentityRegistry, firewall: F, bus: B) -> Self {
        if config.rules.is_empty() {
            warn!("no rules configured; nothing will be exposed");
        }
        Self {
            inner: Arc::new(Inner {
                config,
                registry,
                firewall,
                bus,
                connected: AtomicBool::new(false),
                republish: Mutex::new(RepublishSession::default()),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.inner.registry
    }

    pub fn firewall(&self) -> &F {
        &self.inner.firewall
    }

    pub fn bus(&self) -> &B {
        &self.inner.bus
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Token cancelled once shutdown begins.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// Fetch the firewall's whole rule collection.
    pub async fn get_rules(&self) -> Result<Vec<FilterRule>, CoreError> {
        fetch_rules(&self.inner.firewall).await
    }

    /// Resolve `descriptors` to live rules, fetching them if `rules` is
    /// `None`. Absent rules yield `None` in the matching position.
    pub async fn filter_rules(
        &self,
        descriptors: &[String],
        rules: Option<Vec<FilterRule>>,
    ) -> Result<Vec<Option<FilterRule>>, CoreError> {
        let rules = match rules {
            Some(rules) => rules,
            None => self.get_rules().await?,
        };
        Ok(select_rules(descriptors, rules))
    }

    /// Set or clear the disabled marker on `descriptor` and publish the
    /// resulting state.
    ///
    /// The whole rule collection is sent back because FauxAPI cannot
    /// patch single rows. Edits made on the firewall between the read and
    /// the patch are overwritten. A descriptor with no live rule is a
    /// silent no-op.
    pub async fn update_rule(&self, descriptor: &str, disabled: bool) -> Result<(), CoreError> {
        let mut rules = self.get_rules().await?;

        let Some(rule) = rules
            .iter_mut()
            .rev()
            .find(|rule| rule.descr() == Some(descriptor))
        else {
            debug!(descriptor, "rule not on firewall, ignoring update");
            return Ok(());
        };
        rule.set_disabled(disabled);

        self.inner
            .firewall
            .patch_configuration(&ConfigPatch::rules(rules))
            .await?;
        info!(descriptor, disabled, "firewall rule updated");

        self.publish_rule_state(descriptor, SwitchState::from_disabled(disabled))
            .await
    }

    // ── Announcement ─────────────────────────────────────────────────

    async fn device(&self, descriptor: &str) -> (DeviceId, DeviceTopics) {
        let id = self.inner.registry.get_or_create(descriptor).await;
        let topics = DeviceTopics::new(&self.inner.config.topics.prefix, &id);
        (id, topics)
    }

    /// Subscribe to the rule's command topic and publish its discovery
    /// document. Safe to repeat.
    pub async fn register_rule(&self, descriptor: &str) -> Result<(), CoreError> {
        let (id, device_topics) = self.device(descriptor).await;
        let discovery = SwitchDiscovery::new(descriptor, &id, &device_topics);
        let payload = serde_json::to_vec(&discovery)
            .map_err(|e| CoreError::Internal(format!("cannot encode discovery document: {e}")))?;

        self.inner.bus.subscribe(&device_topics.command).await?;
        let topic = topics::discovery_topic(&self.inner.config.topics.discovery_prefix, &id);
        self.inner
            .bus
            .publish(&topic, payload, Delivery::AtLeastOnce)
            .await?;
        debug!(descriptor, %id, "registered");
        Ok(())
    }

    pub async fn publish_rule_state(
        &self,
        descriptor: &str,
        state: SwitchState,
    ) -> Result<(), CoreError> {
        let (_, device_topics) = self.device(descriptor).await;
        self.inner
            .bus
            .publish(
                &device_topics.state,
                state.as_ref().as_bytes().to_vec(),
                Delivery::BestEffort,
            )
            .await?;
        debug!(descriptor, %state, "state published");
        Ok(())
    }

    async fn publish_availability(
        &self,
        descriptor: &str,
        availability: Availability,
    ) -> Result<(), CoreError> {
        let (_, device_topics) = self.device(descriptor).await;
        self.inner
            .bus
            .publish(
                &device_topics.availability,
                availability.as_ref().as_bytes().to_vec(),
                Delivery::AtLeastOnce,
            )
            .await
    }

    async fn managed_rules(&self) -> Result<Vec<FilterRule>, CoreError> {
        let rules = self.filter_rules(&self.inner.config.rules, None).await?;
        Ok(self
            .inner
            .config
            .rules
            .iter()
            .zip(rules)
            .filter_map(|(descriptor, rule)| {
                if rule.is_none() {
                    debug!(descriptor, "managed rule not found on firewall");
                }
                rule
            })
            .collect())
    }

    /// Republish the state of every managed rule. No-op while the bus is
    /// down.
    pub async fn refresh_rules(&self) -> Result<(), CoreError> {
        if !self.is_connected() {
            return Ok(());
        }
        for rule in self.managed_rules().await? {
            if let Some(descriptor) = rule.descr() {
                self.publish_rule_state(descriptor, SwitchState::of(&rule))
                    .await?;
            }
        }
        Ok(())
    }

    /// One full announce pass: register everything, publish every state,
    /// then mark everything online.
    ///
    /// The online step is skipped once `epoch` is superseded or shutdown
    /// has begun, so a late pass never follows the offline flush.
    async fn announce(&self, epoch: u64) -> Result<(), CoreError> {
        let rules = self.managed_rules().await?;

        for rule in &rules {
            if let Some(descriptor) = rule.descr() {
                self.register_rule(descriptor).await?;
            }
        }
        for rule in &rules {
            if let Some(descriptor) = rule.descr() {
                self.publish_rule_state(descriptor, SwitchState::of(rule))
                    .await?;
            }
        }

        sleep(self.inner.config.timings.availability_pause).await;

        for rule in &rules {
            if !self.cycle_is_live(epoch) {
                debug!(epoch, "cycle superseded, not marking devices online");
                return Ok(());
            }
            if let Some(descriptor) = rule.descr() {
                self.publish_availability(descriptor, Availability::Online)
                    .await?;
            }
        }
        info!(devices = rules.len(), "devices announced");
        Ok(())
    }

    /// Run a republish cycle, superseding any cycle already in progress.
    ///
    /// Iterates while the cycle is current, iterations remain and the bus
    /// is connected. A failed iteration is logged and the loop moves on.
    pub async fn process_rules(&self) {
        let epoch = self.session().start(self.inner.config.republish_count);
        debug!(epoch, "republish cycle started");

        while self.cycle_is_live(epoch) && self.is_connected() {
            if let Err(e) = self.announce(epoch).await {
                warn!(error = %e, "republish iteration failed");
            }
            sleep(self.inner.config.timings.republish_delay).await;
            self.session().complete_iteration(epoch);
        }
        debug!(epoch, "republish cycle finished");
    }

    fn session(&self) -> std::sync::MutexGuard<'_, RepublishSession> {
        self.inner
            .republish
            .lock()
            .expect("republish session lock poisoned")
    }

    fn cycle_is_live(&self, epoch: u64) -> bool {
        !self.inner.cancel.is_cancelled() && self.session().should_run(epoch)
    }

    // ── Bus events ───────────────────────────────────────────────────

    /// Handle one bus event to completion.
    pub async fn handle_event(&self, event: BusEvent) {
        match event {
            BusEvent::Connected => {
                let first = self.mark_connected();
                self.after_connect(first).await;
            }
            BusEvent::Reconnecting => self.mark_disconnected("reconnecting"),
            BusEvent::Error(reason) => self.mark_disconnected(&reason),
            BusEvent::Message { topic, payload } => {
                if let Err(e) = self.process_message(&topic, &payload).await {
                    warn!(topic = %topic, error = %e, "message handling failed");
                }
            }
        }
    }

    /// Apply connection-state changes immediately and run the rest of the
    /// handler on a spawned task.
    ///
    /// Keeps the connection flag in event order even when a slow handler
    /// is still running for an earlier event.
    pub fn dispatch(&self, event: BusEvent) -> Option<JoinHandle<()>> {
        match event {
            BusEvent::Connected => {
                let first = self.mark_connected();
                let sync = self.clone();
                Some(tokio::spawn(async move { sync.after_connect(first).await }))
            }
            BusEvent::Reconnecting => {
                self.mark_disconnected("reconnecting");
                None
            }
            BusEvent::Error(reason) => {
                self.mark_disconnected(&reason);
                None
            }
            message @ BusEvent::Message { .. } => {
                let sync = self.clone();
                Some(tokio::spawn(async move { sync.handle_event(message).await }))
            }
        }
    }

    /// Returns `true` on a transition from disconnected.
    fn mark_connected(&self) -> bool {
        !self.inner.connected.swap(true, Ordering::SeqCst)
    }

    fn mark_disconnected(&self, reason: &str) {
        if self.inner.connected.swap(false, Ordering::SeqCst) {
            warn!(reason, "MQTT connection lost");
        } else {
            debug!(reason, "MQTT still disconnected");
        }
    }

    async fn after_connect(&self, first: bool) {
        if first {
            if let Some(status_topic) = &self.inner.config.topics.status_topic {
                if let Err(e) = self.inner.bus.subscribe(status_topic).await {
                    warn!(topic = %status_topic, error = %e, "cannot subscribe to status topic");
                }
            }
            info!(
                settle_secs = self.inner.config.timings.connect_settle.as_secs(),
                "MQTT connected, announcing devices shortly"
            );
        }
        sleep(self.inner.config.timings.connect_settle).await;
        self.process_rules().await;
    }

    /// Route an inbound message to restart detection or command handling.
    pub async fn process_message(&self, topic: &str, payload: &[u8]) -> Result<(), CoreError> {
        let payload = String::from_utf8_lossy(payload);
        let payload = payload.trim();

        if self.inner.config.topics.status_topic.as_deref() == Some(topic) {
            debug!(payload, "counterpart status");
            if payload == Availability::Online.as_ref() {
                self.on_counterpart_restart().await;
            }
            return Ok(());
        }

        self.process_command(topic, payload).await
    }

    async fn on_counterpart_restart(&self) {
        let settle = self.inner.config.timings.restart_settle;
        info!(settle_secs = settle.as_secs(), "counterpart restarted, re-announcing");
        self.session().halt();
        sleep(settle).await;
        self.process_rules().await;
    }

    /// Toggle the rule behind a command topic. Unknown topics and
    /// identifiers are ignored.
    pub async fn process_command(&self, topic: &str, payload: &str) -> Result<(), CoreError> {
        let Some(id) = topics::device_id_from_command_topic(&self.inner.config.topics.prefix, topic)
        else {
            debug!(topic, "ignoring message on unrecognised topic");
            return Ok(());
        };
        let Some(descriptor) = self.inner.registry.reverse_lookup(&id) else {
            debug!(%id, "ignoring command for unknown device");
            return Ok(());
        };

        let state = SwitchState::from_command(payload);
        info!(descriptor = %descriptor, %state, "command received");
        self.update_rule(&descriptor, state.is_disabled()).await
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the periodic state refresh. Returns `None` when the refresh
    /// interval is zero.
    pub fn spawn_refresh_task(&self) -> Option<JoinHandle<()>> {
        let period = self.inner.config.timings.refresh_interval;
        if period.is_zero() {
            return None;
        }
        let sync = self.clone();
        let cancel = self.inner.cancel.clone();
        Some(tokio::spawn(refresh_task(sync, period, cancel)))
    }

    /// Stop background work and, on a clean exit, mark every managed rule
    /// offline before waiting out the flush grace.
    pub async fn shutdown(&self, kind: ShutdownKind) {
        self.inner.cancel.cancel();
        self.session().halt();

        if kind == ShutdownKind::Clean {
            match self.managed_rules().await {
                Ok(rules) => {
                    for rule in &rules {
                        let Some(descriptor) = rule.descr() else { continue };
                        if let Err(e) = self
                            .publish_availability(descriptor, Availability::Offline)
                            .await
                        {
                            warn!(descriptor, error = %e, "cannot mark device offline");
                        }
                    }
                    info!(devices = rules.len(), "devices marked offline");
                }
                Err(e) => warn!(error = %e, "cannot resolve rules for shutdown"),
            }
        }

        sleep(self.inner.config.timings.shutdown_grace).await;
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn refresh_task<F: FirewallGateway, B: BusGateway>(
    sync: Synchronizer<F, B>,
    period: std::time::Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = sync.refresh_rules().await {
                    warn!(error = %e, "state refresh failed");
                }
            }
        }
    }
}
