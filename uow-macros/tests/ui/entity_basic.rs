use uow_domain::entity::Entity;
use uow_macros::entity;

#[entity]
struct Customer {
    name: String,
}

#[entity(id = u64, debug = false)]
struct Counter {
    value: i64,
}

impl std::fmt::Debug for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Counter#{}", self.id)
    }
}

fn main() {
    let c = Customer {
        id: "c-1".to_string(),
        name: "alice".to_string(),
    };
    assert_eq!(c.id(), "c-1");
    assert!(!c.has_default_id());
    assert_eq!(c.clone().name, "alice");

    let unset = Counter { id: 0, value: 3 };
    assert!(unset.has_default_id());
    assert_eq!(format!("{unset:?}"), "Counter#0");
    assert_eq!(unset.value, 3);
}
