use rand::Rng;
use rand::distr::Alphanumeric;

pub fn random_string(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
}

/// A random DNS-1123 compatible name, usable as an object name
pub fn random_name(prefix: &str) -> String {
    format!("{prefix}-{}", random_string(8).to_lowercase())
}
