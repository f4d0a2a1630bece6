use flashsale_domain::entity::Entity;
use flashsale_domain::value_object::Version;
use flashsale_macros::{entity, entity_id};

#[entity_id]
struct CrateId(i64);

#[entity(id = CrateId)]
struct Crate {
    quantity: u64,
}

// 已显式声明 version 字段时应复用，而非重复追加
#[entity(id = CrateId, debug = false)]
struct Pallet {
    version: Version,
    label: String,
}

impl std::fmt::Debug for Pallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Pallet({})", self.label)
    }
}

fn main() {
    let mut c = Crate {
        id: CrateId::new(7),
        version: Version::new(),
        quantity: 3,
    };
    assert_eq!(c.id().into_inner(), 7);
    assert!(c.version().is_new());
    c.set_version(c.version().next());
    assert_eq!(c.version().value(), 1);
    let _ = format!("{c:?}");

    let p = Pallet {
        id: CrateId::new(1),
        version: Version::from_value(4),
        label: "p".into(),
    };
    assert_eq!(format!("{p:?}"), "Pallet(p)");
    assert_eq!(p.version().value(), 4);
}
