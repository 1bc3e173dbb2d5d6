//! Command rules.
//!
//! A rule decides, per invocation, whether a command body may run. Stateful
//! rules keep their state in the event's [`KeyValueStore`] under
//! `rule:<kind>`, keyed by user ID, so every command gated by the same rule
//! kind shares one slot per user.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};

use linebot_core::KeyValueStore;

use crate::context::EventContext;

const COOLDOWN_NAMESPACE: &str = "rule:cooldown";
const USAGE_NAMESPACE: &str = "rule:usage";

// ============================================================================
// Clock
// ============================================================================

/// Source of the current time for time-based rules.
pub trait Clock: Send + Sync + 'static {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a clock reading `now_millis`.
    pub fn new(now_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(now_millis),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Rule
// ============================================================================

/// User predicate of a custom rule.
pub type RulePredicate = Arc<dyn Fn(&EventContext) -> bool + Send + Sync>;

/// Gate evaluated before a command's arguments are bound.
#[derive(Clone, Default)]
pub enum Rule {
    /// Always passes.
    #[default]
    Always,
    /// Passes when at least this long has passed since the last passing call.
    Cooldown(Duration),
    /// Passes unless the author is listed.
    Except(HashSet<String>),
    /// Passes only for listed authors.
    For(HashSet<String>),
    /// Passes `times + 1` times per user, then rejects.
    UsageLimit(u64),
    /// User predicate; `None` always passes.
    Custom(Option<RulePredicate>),
}

impl Rule {
    /// Cooldown of `seconds`.
    pub fn cooldown(seconds: u64) -> Self {
        Self::Cooldown(Duration::from_secs(seconds))
    }

    /// Everyone except `users`.
    pub fn except<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Except(users.into_iter().map(Into::into).collect())
    }

    /// Only `users`.
    pub fn only<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::For(users.into_iter().map(Into::into).collect())
    }

    /// Usage limit of `times`.
    pub fn usage_limit(times: u64) -> Self {
        Self::UsageLimit(times)
    }

    /// Custom predicate.
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&EventContext) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Some(Arc::new(predicate)))
    }

    /// Name of the rule kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::Cooldown(_) => "cooldown",
            Self::Except(_) => "except",
            Self::For(_) => "for",
            Self::UsageLimit(_) => "usage_limit",
            Self::Custom(_) => "custom",
        }
    }

    /// Evaluates the rule for one invocation by the event's author.
    ///
    /// Authors without a user ID share one anonymous slot for stateful rules,
    /// never match an `Except` list and never match a `For` list.
    pub fn check(&self, ctx: &EventContext, clock: &dyn Clock) -> bool {
        let author = ctx.author_id().unwrap_or_default();
        match self {
            Self::Always | Self::Custom(None) => true,
            Self::Custom(Some(predicate)) => predicate(ctx),
            Self::Except(users) => !users.contains(author),
            Self::For(users) => ctx.author_id().is_some_and(|id| users.contains(id)),
            Self::Cooldown(period) => {
                check_cooldown(ctx.store().as_ref(), author, *period, clock)
            }
            Self::UsageLimit(times) => check_usage(ctx.store().as_ref(), author, *times),
        }
    }
}

fn check_cooldown(
    store: &dyn KeyValueStore,
    author: &str,
    period: Duration,
    clock: &dyn Clock,
) -> bool {
    let now = clock.now_millis();
    let period = period.as_millis() as i64;
    let mut passed = false;
    store.modify(COOLDOWN_NAMESPACE, author, &mut |slot| {
        passed = match slot.as_ref().and_then(Value::as_i64) {
            None => true,
            Some(last) => now - last >= period,
        };
        if passed {
            *slot = Some(json!(now));
        }
    });
    passed
}

fn check_usage(store: &dyn KeyValueStore, author: &str, times: u64) -> bool {
    let mut passed = false;
    store.modify(USAGE_NAMESPACE, author, &mut |slot| {
        let count = slot.as_ref().and_then(Value::as_u64).unwrap_or(0);
        // compared before incrementing, so `times + 1` calls pass
        passed = count <= times;
        if passed {
            *slot = Some(json!(count + 1));
        }
    });
    passed
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::Cooldown(d) => f.debug_tuple("Cooldown").field(d).finish(),
            Self::Except(u) => f.debug_tuple("Except").field(u).finish(),
            Self::For(u) => f.debug_tuple("For").field(u).finish(),
            Self::UsageLimit(t) => f.debug_tuple("UsageLimit").field(t).finish(),
            Self::Custom(p) => f
                .debug_tuple("Custom")
                .field(&p.as_ref().map(|_| "<predicate>"))
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::Correlation;
    use linebot_core::testing::{MockApi, text_event};
    use linebot_core::{BoxedStore, Event, MemoryStore, parse};

    fn ctx(store: &BoxedStore, user: &str) -> EventContext {
        let event = Event::new(
            parse(text_event("!cmd", user)).unwrap(),
            MockApi::shared(),
            store.clone(),
        );
        EventContext::new(
            Arc::new(event),
            Arc::new(Correlation::new(store.clone())),
            false,
        )
    }

    #[test]
    fn cooldown_resets_only_on_pass() {
        let store = MemoryStore::shared();
        let clock = ManualClock::new(1_000_000);
        let rule = Rule::cooldown(10);
        let alice = ctx(&store, "Ualice");

        assert!(rule.check(&alice, &clock));
        clock.advance(Duration::from_secs(2));
        assert!(!rule.check(&alice, &clock));
        clock.advance(Duration::from_secs(9));
        assert!(rule.check(&alice, &clock));
        clock.advance(Duration::from_secs(5));
        assert!(!rule.check(&alice, &clock));
    }

    #[test]
    fn cooldown_is_per_user() {
        let store = MemoryStore::shared();
        let clock = ManualClock::new(0);
        let rule = Rule::cooldown(10);

        assert!(rule.check(&ctx(&store, "Ua"), &clock));
        assert!(rule.check(&ctx(&store, "Ub"), &clock));
        assert!(!rule.check(&ctx(&store, "Ua"), &clock));
    }

    #[test]
    fn state_is_shared_across_commands() {
        let store = MemoryStore::shared();
        let clock = ManualClock::new(0);
        let user = ctx(&store, "U1");

        // two commands each gated by their own cooldown(10)
        let drink = Rule::cooldown(10);
        let eat = Rule::cooldown(10);
        assert!(drink.check(&user, &clock));
        assert!(!eat.check(&user, &clock));
        clock.advance(Duration::from_secs(10));
        assert!(eat.check(&user, &clock));
        assert!(!drink.check(&user, &clock));

        let limit = Rule::usage_limit(1);
        let results: Vec<bool> = (0..3).map(|_| limit.check(&user, &clock)).collect();
        assert_eq!(results, [true, true, false]);
    }

    #[test]
    fn usage_limit_allows_one_extra_call() {
        let store = MemoryStore::shared();
        let clock = SystemClock;
        let rule = Rule::usage_limit(1);
        let user = ctx(&store, "U1");

        assert!(rule.check(&user, &clock));
        assert!(rule.check(&user, &clock));
        assert!(!rule.check(&user, &clock));
        assert!(!rule.check(&user, &clock));
    }

    #[test]
    fn user_lists() {
        let store = MemoryStore::shared();
        let clock = SystemClock;
        let banned = Rule::except(["Ubad"]);
        let admins = Rule::only(["Uadmin"]);

        assert!(!banned.check(&ctx(&store, "Ubad"), &clock));
        assert!(banned.check(&ctx(&store, "Ugood"), &clock));
        assert!(admins.check(&ctx(&store, "Uadmin"), &clock));
        assert!(!admins.check(&ctx(&store, "Ugood"), &clock));
    }

    #[test]
    fn custom_rules() {
        let store = MemoryStore::shared();
        let clock = SystemClock;
        let even = Rule::custom(|ctx| ctx.text().is_some_and(|t| t.len() % 2 == 0));

        assert!(even.check(&ctx(&store, "U1"), &clock));
        assert!(Rule::Custom(None).check(&ctx(&store, "U1"), &clock));
        assert!(Rule::default().check(&ctx(&store, "U1"), &clock));
    }
}
