use uow_domain::domain_event::DomainEvent;
use uow_macros::domain_event;

#[domain_event]
enum PingEvent {
    Pinged { id: String, at: u64 },
}

fn main() {
    let e = PingEvent::Pinged {
        id: "p-1".into(),
        at: 7,
    };
    assert_eq!(e.event_id(), "p-1");
    assert_eq!(e.event_type(), "PingEvent.Pinged");
    assert_eq!(e.event_version(), 1);
}
