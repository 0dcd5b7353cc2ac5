// skysearch/poller.rs
use crate::config::SkySearchConfig;
use crate::database::Database;
use crate::error::Error;
use crate::skysearch::aircraft::{Aircraft, EmergencySquawk};
use crate::skysearch::api::{AircraftQuery, SkySearchApi};
use crate::skysearch::embeds::{emergency_embed, landed_embed};
use poise::serenity_prelude::{ChannelId, CreateAllowedMentions, CreateMessage, Http, RoleId};
use serenity::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// A guild that has opted in to emergency alerts.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertSubscription {
    pub guild_id: i64,
    pub channel_id: i64,
    pub role_id: Option<i64>,
    pub cooldown_minutes: i32,
}

impl AlertSubscription {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_minutes.max(0) as u64 * 60)
    }
}

#[derive(Debug, Clone)]
pub struct PlannedAlert {
    pub guild_id: i64,
    pub channel_id: i64,
    pub role_id: Option<i64>,
    pub squawk: EmergencySquawk,
    pub aircraft: Aircraft,
    pub landed: bool,
}

/// Remembers when each (guild, aircraft) pair was last alerted.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    last_sent: HashMap<(i64, String), Instant>,
}

impl CooldownTracker {
    /// Returns true and records `now` if the pair is outside its cooldown window.
    pub fn try_claim(&mut self, guild_id: i64, hex: &str, cooldown: Duration, now: Instant) -> bool {
        let key = (guild_id, hex.to_string());
        match self.last_sent.get(&key) {
            Some(sent) if now.saturating_duration_since(*sent) < cooldown => false,
            _ => {
                self.last_sent.insert(key, now);
                true
            }
        }
    }

    /// Forgets a claim so the next tick tries again.
    pub fn release(&mut self, guild_id: i64, hex: &str) {
        self.last_sent.remove(&(guild_id, hex.to_string()));
    }

    pub fn prune(&mut self, max_age: Duration, now: Instant) {
        self.last_sent
            .retain(|_, sent| now.saturating_duration_since(*sent) < max_age);
    }

    pub fn len(&self) -> usize {
        self.last_sent.len()
    }
}

pub struct AlertFilter<'a> {
    pub ignored_hexes: &'a [String],
    pub landed_altitude_ft: f64,
}

/// Decides which alerts to send this tick.
pub fn plan_alerts(
    sightings: &[(EmergencySquawk, Aircraft)],
    subscriptions: &[AlertSubscription],
    tracker: &mut CooldownTracker,
    filter: &AlertFilter<'_>,
    now: Instant,
) -> Vec<PlannedAlert> {
    let mut alerts = Vec::new();

    for (squawk, aircraft) in sightings {
        let Some(hex) = aircraft.hex() else {
            continue;
        };
        if filter.ignored_hexes.iter().any(|ignored| ignored.eq_ignore_ascii_case(&hex)) {
            continue;
        }
        let landed = aircraft.has_landed(filter.landed_altitude_ft);

        for subscription in subscriptions {
            if !tracker.try_claim(subscription.guild_id, &hex, subscription.cooldown(), now) {
                continue;
            }
            alerts.push(PlannedAlert {
                guild_id: subscription.guild_id,
                channel_id: subscription.channel_id,
                role_id: subscription.role_id,
                squawk: *squawk,
                aircraft: aircraft.clone(),
                landed,
            });
        }
    }

    alerts
}

/// Queries every emergency code; a failing code is logged and skipped.
pub async fn collect_sightings(api: &SkySearchApi) -> Vec<(EmergencySquawk, Aircraft)> {
    let mut sightings = Vec::new();
    for squawk in EmergencySquawk::ALL {
        match api.fetch(&AircraftQuery::Squawk(squawk.code().to_string())).await {
            Ok(response) => {
                debug!("{} aircraft squawking {}", response.ac.len(), squawk.code());
                sightings.extend(response.ac.into_iter().map(|aircraft| (squawk, aircraft)));
            }
            Err(e) => warn!("Failed to fetch squawk {}: {}", squawk.code(), e),
        }
    }
    sightings
}

/// Where the poller reads guild subscriptions from.
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    async fn alert_subscriptions(&self) -> Result<Vec<AlertSubscription>, Error>;
}

#[async_trait]
impl SubscriptionSource for Database {
    async fn alert_subscriptions(&self) -> Result<Vec<AlertSubscription>, Error> {
        self.fetch_alert_subscriptions().await
    }
}

/// Where alert messages are delivered.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, channel_id: ChannelId, message: CreateMessage) -> Result<(), Error>;
}

#[async_trait]
impl AlertSink for Arc<Http> {
    async fn send(&self, channel_id: ChannelId, message: CreateMessage) -> Result<(), Error> {
        channel_id.send_message(&**self, message).await?;
        Ok(())
    }
}

/// The alert itself, then a landed notice when the aircraft is down.
/// Only the subscribed role may be pinged.
pub fn alert_messages(alert: &PlannedAlert) -> Vec<CreateMessage> {
    let mut alert_message = CreateMessage::new().embed(emergency_embed(&alert.aircraft, alert.squawk));
    alert_message = match alert.role_id {
        Some(role_id) => {
            let role = RoleId::new(role_id as u64);
            alert_message
                .content(format!("<@&{}>", role))
                .allowed_mentions(CreateAllowedMentions::new().roles(vec![role]))
        }
        None => alert_message.allowed_mentions(CreateAllowedMentions::new()),
    };

    let mut messages = vec![alert_message];
    if alert.landed {
        messages.push(
            CreateMessage::new()
                .embed(landed_embed(&alert.aircraft))
                .allowed_mentions(CreateAllowedMentions::new()),
        );
    }
    messages
}

pub struct EmergencyPoller<S, K> {
    api: SkySearchApi,
    subscriptions: S,
    sink: K,
    config: SkySearchConfig,
    tracker: CooldownTracker,
}

impl<S, K> EmergencyPoller<S, K>
where
    S: SubscriptionSource + 'static,
    K: AlertSink + 'static,
{
    pub fn new(api: SkySearchApi, subscriptions: S, sink: K, config: SkySearchConfig) -> Self {
        Self {
            api,
            subscriptions,
            sink,
            config,
            tracker: CooldownTracker::default(),
        }
    }

    /// Runs until `shutdown` flips to true or its sender is dropped.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.poll_interval();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Emergency squawk poller started, polling every {}s", period.as_secs());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("Emergency squawk poll failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Emergency squawk poller stopped");
    }

    /// One poll. Returns how many alerts were delivered.
    async fn tick(&mut self) -> Result<usize, Error> {
        let subscriptions = self.subscriptions.alert_subscriptions().await?;
        if subscriptions.is_empty() {
            debug!("No guilds subscribed to emergency alerts, skipping poll");
            return Ok(0);
        }

        let sightings = collect_sightings(&self.api).await;
        let now = Instant::now();
        let filter = AlertFilter {
            ignored_hexes: &self.config.ignored_hexes,
            landed_altitude_ft: self.config.landed_altitude_ft,
        };
        let alerts = plan_alerts(&sightings, &subscriptions, &mut self.tracker, &filter, now);

        let longest = subscriptions
            .iter()
            .map(AlertSubscription::cooldown)
            .max()
            .unwrap_or_default();
        self.tracker.prune(longest, now);

        if !alerts.is_empty() {
            info!("Sending {} emergency alerts for {} sightings", alerts.len(), sightings.len());
        }

        let mut delivered = 0;
        for alert in &alerts {
            match self.dispatch(alert).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Failed to send emergency alert to guild {}: {}", alert.guild_id, e);
                    if let Some(hex) = alert.aircraft.hex() {
                        self.tracker.release(alert.guild_id, &hex);
                    }
                }
            }
        }
        debug!("{} aircraft in alert cooldown", self.tracker.len());

        Ok(delivered)
    }

    /// Fails only when the alert itself could not be sent.
    async fn dispatch(&self, alert: &PlannedAlert) -> Result<(), Error> {
        let channel = ChannelId::new(alert.channel_id as u64);
        let mut messages = alert_messages(alert).into_iter();

        if let Some(first) = messages.next() {
            self.sink.send(channel, first).await?;
        }
        for follow_up in messages {
            if let Err(e) = self.sink.send(channel, follow_up).await {
                warn!("Failed to send landed notice to guild {}: {}", alert.guild_id, e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skysearch::aircraft::Altitude;
    use httpmock::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn aircraft(hex: &str, alt: Altitude) -> Aircraft {
        Aircraft {
            hex: Some(hex.to_string()),
            alt_baro: Some(alt),
            ..Default::default()
        }
    }

    fn subscription(guild_id: i64, cooldown_minutes: i32) -> AlertSubscription {
        AlertSubscription {
            guild_id,
            channel_id: guild_id * 10,
            role_id: None,
            cooldown_minutes,
        }
    }

    fn filter(ignored: &[String]) -> AlertFilter<'_> {
        AlertFilter {
            ignored_hexes: ignored,
            landed_altitude_ft: 25.0,
        }
    }

    #[test]
    fn alerts_fan_out_to_every_subscribed_guild() {
        let sightings = vec![
            (EmergencySquawk::GeneralEmergency, aircraft("abc123", Altitude::Feet(9000.0))),
            (EmergencySquawk::RadioFailure, aircraft("def456", Altitude::Text("ground".into()))),
        ];
        let subs = vec![subscription(1, 5), subscription(2, 5)];
        let mut tracker = CooldownTracker::default();

        let alerts = plan_alerts(&sightings, &subs, &mut tracker, &filter(&[]), Instant::now());

        assert_eq!(alerts.len(), 4);
        assert_eq!(alerts.iter().filter(|a| a.landed).count(), 2);
        assert!(alerts.iter().any(|a| a.guild_id == 2 && a.channel_id == 20));
    }

    #[test]
    fn sentinel_and_hexless_aircraft_are_skipped() {
        let ignored = vec!["000000".to_string()];
        let sightings = vec![
            (EmergencySquawk::Hijacking, aircraft("000000", Altitude::Feet(1000.0))),
            (EmergencySquawk::Hijacking, Aircraft::default()),
        ];
        let mut tracker = CooldownTracker::default();

        let alerts = plan_alerts(&sightings, &[subscription(1, 5)], &mut tracker, &filter(&ignored), Instant::now());
        assert!(alerts.is_empty());
    }

    #[test]
    fn cooldown_suppresses_repeats_per_guild() {
        let sightings = vec![(EmergencySquawk::GeneralEmergency, aircraft("abc123", Altitude::Feet(9000.0)))];
        let subs = vec![subscription(1, 5), subscription(2, 1)];
        let mut tracker = CooldownTracker::default();
        let start = Instant::now();

        assert_eq!(plan_alerts(&sightings, &subs, &mut tracker, &filter(&[]), start).len(), 2);

        // Two minutes later only the guild with a one minute cooldown hears about it again.
        let later = start + Duration::from_secs(120);
        let alerts = plan_alerts(&sightings, &subs, &mut tracker, &filter(&[]), later);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].guild_id, 2);

        let much_later = start + Duration::from_secs(301);
        assert_eq!(plan_alerts(&sightings, &subs, &mut tracker, &filter(&[]), much_later).len(), 2);
    }

    #[test]
    fn prune_drops_expired_entries() {
        let mut tracker = CooldownTracker::default();
        let start = Instant::now();
        tracker.try_claim(1, "abc123", Duration::from_secs(60), start);
        tracker.try_claim(1, "def456", Duration::from_secs(60), start + Duration::from_secs(50));

        tracker.prune(Duration::from_secs(60), start + Duration::from_secs(70));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn negative_cooldown_is_treated_as_zero() {
        assert_eq!(subscription(1, -3).cooldown(), Duration::ZERO);
    }

    #[tokio::test]
    async fn sightings_survive_a_failing_code() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/squawk/7500");
                then.status(200).json_body(serde_json::json!({"ac": [{"hex": "aaa111"}]}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.path("/squawk/7600");
                then.status(500);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.path("/squawk/7700");
                then.status(200).json_body(serde_json::json!({"ac": [{"hex": "bbb222"}, {"hex": "ccc333"}]}));
            })
            .await;

        let config = SkySearchConfig {
            primary_api_url: server.base_url(),
            fallback_api_url: None,
            ..Default::default()
        };
        let api = SkySearchApi::new(reqwest::Client::new(), &config);
        let sightings = collect_sightings(&api).await;

        assert_eq!(sightings.len(), 3);
        assert_eq!(sightings[0].0, EmergencySquawk::Hijacking);
        assert!(sightings[1..].iter().all(|(s, _)| *s == EmergencySquawk::GeneralEmergency));
    }

    struct FixedSubscriptions {
        subscriptions: Vec<AlertSubscription>,
        calls: AtomicUsize,
    }

    impl FixedSubscriptions {
        fn new(subscriptions: Vec<AlertSubscription>) -> Arc<Self> {
            Arc::new(Self { subscriptions, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl SubscriptionSource for Arc<FixedSubscriptions> {
        async fn alert_subscriptions(&self) -> Result<Vec<AlertSubscription>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.subscriptions.clone())
        }
    }

    /// Records every attempted send; sends to `failing` channels return an error.
    #[derive(Clone, Default)]
    struct RecordingSink {
        sent: Arc<Mutex<Vec<(u64, serde_json::Value)>>>,
        failing: Vec<u64>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn send(&self, channel_id: ChannelId, message: CreateMessage) -> Result<(), Error> {
            let value = serde_json::to_value(&message).unwrap();
            self.sent.lock().unwrap().push((channel_id.get(), value));
            if self.failing.contains(&channel_id.get()) {
                return Err(Error::Api("Missing Permissions".to_string()));
            }
            Ok(())
        }
    }

    fn planned(role_id: Option<i64>, landed: bool) -> PlannedAlert {
        PlannedAlert {
            guild_id: 1,
            channel_id: 10,
            role_id,
            squawk: EmergencySquawk::GeneralEmergency,
            aircraft: aircraft("abc123", Altitude::Feet(if landed { 0.0 } else { 9000.0 })),
            landed,
        }
    }

    #[test]
    fn alert_pings_only_the_subscribed_role() {
        let messages = alert_messages(&planned(Some(42), false));
        assert_eq!(messages.len(), 1);

        let value = serde_json::to_value(&messages[0]).unwrap();
        assert_eq!(value["content"], "<@&42>");
        let mentions = &value["allowed_mentions"];
        assert_eq!(mentions["roles"], serde_json::json!([serde_json::to_value(RoleId::new(42)).unwrap()]));
        assert!(mentions["parse"].as_array().map_or(true, |parse| parse.is_empty()));
        assert!(mentions["users"].as_array().map_or(true, |users| users.is_empty()));
    }

    #[test]
    fn alert_without_role_pings_nobody() {
        let value = serde_json::to_value(&alert_messages(&planned(None, false))[0]).unwrap();
        assert!(value["content"].is_null());
        let mentions = &value["allowed_mentions"];
        assert!(mentions.is_object());
        assert!(mentions["roles"].as_array().map_or(true, |roles| roles.is_empty()));
        assert!(mentions["parse"].as_array().map_or(true, |parse| parse.is_empty()));
    }

    #[test]
    fn landed_notice_follows_the_alert() {
        let messages = alert_messages(&planned(Some(42), true));
        assert_eq!(messages.len(), 2);

        let first = serde_json::to_value(&messages[0]).unwrap();
        let second = serde_json::to_value(&messages[1]).unwrap();
        assert_eq!(first["embeds"][0]["title"], "Emergency squawk 7700: General emergency");
        assert_eq!(second["embeds"][0]["title"], "Aircraft has landed");
        assert!(second["content"].is_null());
    }

    async fn squawk_server() -> MockServer {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/squawk/7700");
                then.status(200).json_body(serde_json::json!({"ac": [{"hex": "abc123", "squawk": "7700", "alt_baro": 8000}]}));
            })
            .await;
        for code in ["7500", "7600"] {
            server
                .mock_async(|when, then| {
                    when.path(format!("/squawk/{}", code));
                    then.status(200).json_body(serde_json::json!({"ac": []}));
                })
                .await;
        }
        server
    }

    fn poller_config(base_url: String) -> SkySearchConfig {
        SkySearchConfig {
            primary_api_url: base_url,
            fallback_api_url: None,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn failed_send_is_retried_next_tick() {
        let server = squawk_server().await;
        let config = poller_config(server.base_url());
        let api = SkySearchApi::new(reqwest::Client::new(), &config);
        let source = FixedSubscriptions::new(vec![subscription(1, 5), subscription(2, 5)]);
        let sink = RecordingSink {
            failing: vec![20],
            ..Default::default()
        };
        let mut poller = EmergencyPoller::new(api, source, sink.clone(), config);

        assert_eq!(poller.tick().await.unwrap(), 1);
        assert_eq!(poller.tracker.len(), 1);

        // Guild 1 is inside its cooldown; guild 2 never heard about the aircraft.
        assert_eq!(poller.tick().await.unwrap(), 0);
        let channels: Vec<u64> = sink.sent.lock().unwrap().iter().map(|(channel, _)| *channel).collect();
        assert_eq!(channels.iter().filter(|c| **c == 10).count(), 1);
        assert_eq!(channels.iter().filter(|c| **c == 20).count(), 2);
    }

    #[tokio::test]
    async fn shutdown_signal_stops_the_poller() {
        let server = MockServer::start_async().await;
        let any_request = server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).json_body(serde_json::json!({"ac": []}));
            })
            .await;

        let config = poller_config(server.base_url());
        let api = SkySearchApi::new(reqwest::Client::new(), &config);
        let source = FixedSubscriptions::new(Vec::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = EmergencyPoller::new(api, source.clone(), RecordingSink::default(), config).spawn(shutdown_rx);

        tokio::time::timeout(Duration::from_secs(5), async {
            while source.calls.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("first tick runs immediately");

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("poller exits after shutdown")
            .unwrap();

        // With no subscribers the API is never queried.
        any_request.assert_hits_async(0).await;
    }
}
