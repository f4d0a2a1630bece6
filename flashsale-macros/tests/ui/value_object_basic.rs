use flashsale_macros::value_object;

#[value_object]
struct Money {
    amount: u64,
}

#[value_object(debug = false)]
enum Tier {
    #[default]
    Basic,
    Gold,
}

impl std::fmt::Debug for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Basic => write!(f, "basic"),
            Tier::Gold => write!(f, "gold"),
        }
    }
}

fn main() {
    assert_eq!(Money::default(), Money { amount: 0 });
    assert_eq!(format!("{:?}", Tier::default()), "basic");
    assert_ne!(Tier::Gold, Tier::Basic);
}
