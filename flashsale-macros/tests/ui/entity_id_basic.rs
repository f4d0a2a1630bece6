use flashsale_macros::entity_id;
use uuid::Uuid;

#[entity_id]
struct AccountId(i64);

#[entity_id]
struct TicketId(Uuid);

fn main() {
    let id = AccountId::new(42);
    assert_eq!(id.to_string(), "42");
    assert_eq!("42".parse::<AccountId>().unwrap(), id);
    let raw: i64 = id.into();
    assert_eq!(raw, 42);
    assert!(AccountId::new(1) < AccountId::new(2));

    let t = TicketId::new(Uuid::new_v4());
    let copy = t;
    assert_eq!(t, copy);
}
