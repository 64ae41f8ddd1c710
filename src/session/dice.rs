use rand::Rng;

pub const DEFAULT_DIE: &str = "d20";

/// Upper bound for a die label. `custom` takes the caller's bound when it is
/// positive; anything unrecognised rolls as a d20.
pub fn max_value(dice_type: &str, custom_value: Option<i64>) -> i64 {
    match (dice_type, custom_value) {
        ("d4", _) => 4,
        ("d6", _) => 6,
        ("d8", _) => 8,
        ("d10", _) => 10,
        ("d12", _) => 12,
        ("d20", _) => 20,
        ("custom", Some(bound)) if bound > 0 => bound,
        _ => 20,
    }
}

/// Uniform draw in `1..=max`.
pub fn roll_with<R: Rng + ?Sized>(rng: &mut R, max: i64) -> i64 {
    rng.random_range(1..=max.max(1))
}

pub fn roll(max: i64) -> i64 {
    roll_with(&mut rand::rng(), max)
}
