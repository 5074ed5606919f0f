use antibody_parser::hex_string::{parse_hex_string, Token};

#[track_caller]
pub fn hex(s: &str) -> Vec<Token> {
    parse_hex_string(s).unwrap()
}

// Those helpers ensure public types have expected impls: Clone, Debug, Send & Sync
pub fn test_type_traits<T: Clone + std::fmt::Debug + Send + Sync>(t: T) {
    #[allow(clippy::redundant_clone)]
    let _r = t.clone();
    let _r = format!("{:?}", &t);
}

pub fn test_type_traits_non_clonable<T: std::fmt::Debug + Send + Sync>(t: T) {
    let _r = format!("{:?}", &t);
}
