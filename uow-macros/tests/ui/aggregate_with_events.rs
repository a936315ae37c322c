use uow_domain::aggregate::{Aggregate, EventSource};
use uow_domain::domain_event::{DomainEvent, EventContext};
use uow_macros::{domain_event, entity, entity_id};

#[entity_id]
struct AccountId(uuid::Uuid);

#[domain_event(version = 1)]
enum AccountEvent {
    Opened { owner: String },
    #[event(event_type = "account.renamed", event_version = 2)]
    Renamed { to: String },
}

#[entity(id = AccountId, event = AccountEvent, aggregate_type = "account")]
struct Account {
    owner: String,
}

fn main() {
    assert!(AccountId::default().is_unset());

    let mut account = Account {
        id: AccountId::new(uuid::Uuid::new_v4()),
        owner: "bob".into(),
        events: Default::default(),
    };
    account.raise(AccountEvent::Opened {
        id: "e-1".into(),
        owner: "bob".into(),
    });
    account.raise(AccountEvent::Renamed {
        id: "e-2".into(),
        to: "robert".into(),
    });

    assert_eq!(Account::TYPE, "account");
    assert_eq!(account.pending_event_count(), 2);
    assert_eq!(account.events().as_slice()[0].event_type(), "AccountEvent.Opened");
    assert_eq!(account.events().as_slice()[1].event_type(), "account.renamed");
    assert_eq!(account.events().as_slice()[1].event_version(), 2);

    let detached = account.detach_events(&EventContext::default());
    assert_eq!(detached.len(), 2);
    assert_eq!(detached[0].event_id(), "e-1");
    assert!(!account.has_pending_events());
}
