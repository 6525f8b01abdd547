//! 엔진 전체 시나리오 테스트

use std::sync::{Arc, Once};

use serde_json::{json, Value};

use crate::config::{with_config, Config};
use crate::dsl::{inherit, Protectable};
use crate::error::Error;
use crate::insecure::insecurely;
use crate::permissions::{Action, Ancestor, Attributes, Constraint, ALL};

/// `RUST_LOG`로 테스트 로그 확인
fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "protector_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

fn attrs(pairs: &[(&str, Value)]) -> Attributes {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

struct Widget(&'static str);

impl Protectable for Widget {
    type Subject = Option<String>;
    type Scope = String;

    fn protector_fields() -> Vec<String> {
        (1..=5).map(|i| format!("field{}", i)).collect()
    }
}

fn setup_widget() {
    init_tracing();
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        Widget::protector_meta()
            .protect_bare(|rules| {
                rules.can(Action::Read, ALL);
            })
            .protect_bare(|rules| {
                rules.cannot(Action::Read, ["field4", "field5"]);
            })
            .protect(|rules, user, entry| {
                if user.as_deref() == Some("user") && entry.is_some_and(|e| e.0 == "entry") {
                    rules.can(Action::Update, ["field1", "field2"]);
                    rules.can_with(
                        Action::Update,
                        [
                            ("field3", Constraint::literal(1)),
                            ("field4", Constraint::range(0..=5)),
                            (
                                "field5",
                                Constraint::predicate(|x| x.as_i64().is_some_and(|x| x > 4)),
                            ),
                        ],
                    );
                    rules.can(Action::Destroy, ALL);
                }
            });
    });
}

#[test]
fn test_scenario_full_rule_set() {
    setup_widget();
    let decision = Widget::protector_meta()
        .evaluate(&Some("user".to_string()), Some(&Widget("entry")))
        .unwrap();

    let read: Vec<&str> = decision.access()[&Action::Read]
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(read, vec!["field1", "field2", "field3"]);
    assert!(decision.access()[&Action::Read]
        .values()
        .all(Constraint::is_unconstrained));

    let update = &decision.access()[&Action::Update];
    assert_eq!(update.len(), 5);
    assert!(update["field1"].is_unconstrained());
    assert!(update["field2"].is_unconstrained());
    assert_eq!(update["field3"], Constraint::literal(1));
    assert_eq!(update["field4"], Constraint::range(0..=5));
    assert!(matches!(update["field5"], Constraint::Predicate(_)));

    assert!(decision.destroyable());
    assert!(!decision.creatable(None));
}

#[test]
fn test_scenario_predicate_on_update() {
    setup_widget();
    let decision = Widget::protector_meta()
        .evaluate(&Some("user".to_string()), Some(&Widget("entry")))
        .unwrap();

    assert!(decision.updatable(Some(&attrs(&[("field5", json!(5))]))));
    assert!(!decision.updatable(Some(&attrs(&[("field5", json!(3))]))));
    assert!(decision.updatable(Some(&attrs(&[("field4", json!(5)), ("field3", json!(1))]))));
    assert!(!decision.updatable(Some(&attrs(&[("field3", json!(2))]))));
}

#[test]
fn test_scenario_first_offending_field() {
    setup_widget();
    let decision = Widget::protector_meta()
        .evaluate(&Some("user".to_string()), Some(&Widget("entry")))
        .unwrap();

    let candidate = attrs(&[
        ("field1", json!(1)),
        ("field6", json!(2)),
        ("field7", json!(3)),
    ]);
    assert_eq!(
        decision.first_unupdatable_field(&candidate),
        Some("field6".to_string())
    );
}

#[test]
fn test_other_subject_gets_read_only() {
    setup_widget();
    let decision = Widget::protector_meta()
        .evaluate(&None, Some(&Widget("entry")))
        .unwrap();
    assert!(decision.can(Action::Read));
    assert!(!decision.can(Action::Update));
    assert!(!decision.destroyable());
}

struct Ticket;

impl Protectable for Ticket {
    type Subject = ();
    type Scope = &'static str;

    fn protector_fields() -> Vec<String> {
        vec!["title".to_string()]
    }
}

#[test]
fn test_paranoid_mode_scopes_every_decision() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        Ticket::protect_subject(|rules, _| {
            rules.can(Action::Read, ALL);
        });
    });

    let open = with_config(Config { paranoid: false }, || {
        Ticket::protector_meta().evaluate(&(), None).unwrap()
    });
    assert!(!open.scoped());
    assert!(open.visible(&Ticket, |_, _| false));

    let paranoid = with_config(Config { paranoid: true }, || {
        Ticket::protector_meta().evaluate(&(), None).unwrap()
    });
    assert!(paranoid.scoped());
    assert!(paranoid.relation().is_none());
    assert!(!paranoid.visible(&Ticket, |_, _| true));
}

struct Animal {
    name: &'static str,
}

struct Dog {
    animal: Animal,
}

impl AsRef<Animal> for Dog {
    fn as_ref(&self) -> &Animal {
        &self.animal
    }
}

impl Protectable for Animal {
    type Subject = ();
    type Scope = String;

    fn protector_fields() -> Vec<String> {
        vec!["test".to_string()]
    }
}

impl Protectable for Dog {
    type Subject = ();
    type Scope = String;

    fn protector_fields() -> Vec<String> {
        vec!["test".to_string()]
    }

    fn protector_parent() -> Option<Arc<dyn Ancestor<Self>>> {
        inherit::<Animal, Self>()
    }
}

#[test]
fn test_inheritance_extends_parent_rules() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        Animal::protect_subject(|rules, _| {
            rules.can(Action::Read, ALL).scope("animals".to_string());
        });
        Dog::protect_subject(|rules, _| {
            rules.can(Action::Create, ALL);
        });
    });

    let animal = Animal::protector_meta()
        .evaluate(&(), Some(&Animal { name: "cat" }))
        .unwrap();
    assert_eq!(animal.access().len(), 1);
    assert!(animal.can_field(Action::Read, "test"));
    assert!(!animal.can(Action::Create));

    let dog = Dog {
        animal: Animal { name: "rex" },
    };
    let decision = Dog::protector_meta().evaluate(&(), Some(&dog)).unwrap();
    assert_eq!(decision.access().len(), 2);
    assert!(decision.can_field(Action::Read, "test"));
    assert!(decision.can_field(Action::Create, "test"));
    assert_eq!(decision.relation().map(String::as_str), Some("animals"));
    assert_eq!(dog.as_ref().name, "rex");

    assert_eq!(Animal::protector_meta().len(), 1);
    assert_eq!(Dog::protector_meta().len(), 1);
}

struct Fridge;

impl Protectable for Fridge {
    type Subject = ();
    type Scope = ();

    fn protector_fields() -> Vec<String> {
        vec!["milk".to_string(), "cake".to_string()]
    }
}

#[test]
fn test_custom_actions_and_view_alias() {
    init_tracing();
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        Fridge::protector_meta().protect_bare(|rules| {
            rules.can("drink", "milk");
            rules.can("eat", ALL);
            rules.cannot("eat", "milk");
            rules.can("view", "cake");
        });
    });

    let decision = Fridge::protector_meta().evaluate(&(), None).unwrap();
    assert!(decision.can_field("drink", "milk"));
    assert!(!decision.can_field("drink", "cake"));
    assert!(decision.can_field("eat", "cake"));
    assert!(!decision.can_field("eat", "milk"));
    assert!(decision.readable("cake"));
    assert!(decision.can_field("view", "cake"));
}

struct Vault;

impl Protectable for Vault {
    type Subject = String;
    type Scope = ();

    fn protector_fields() -> Vec<String> {
        vec!["gold".to_string()]
    }
}

#[test]
fn test_rule_error_propagates_verbatim() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        Vault::protect_subject(|rules, user| {
            if user != "owner" {
                anyhow::bail!("wrong user");
            }
            rules.can(Action::Read, ALL);
            Ok(())
        });
    });

    let err = Vault::protector_meta()
        .evaluate(&"thief".to_string(), None)
        .unwrap_err();
    assert!(matches!(err, Error::Rule(_)));
    assert_eq!(err.to_string(), "wrong user");
    assert_eq!(err.code(), "RULE_FAILED");
    assert!(!crate::insecure::is_insecure());

    let decision = Vault::protector_meta()
        .evaluate(&"owner".to_string(), None)
        .unwrap();
    assert!(decision.readable("gold"));
}

#[test]
fn test_evaluation_is_deterministic() {
    setup_widget();
    let meta = Widget::protector_meta();
    let subject = Some("user".to_string());
    let a = meta.evaluate(&subject, Some(&Widget("entry"))).unwrap();
    let b = insecurely(|| meta.evaluate(&subject, Some(&Widget("entry"))).unwrap());
    assert_eq!(
        format!("{:?}", a.access()[&Action::Read]),
        format!("{:?}", b.access()[&Action::Read])
    );
    assert_eq!(a.access().len(), b.access().len());
}
