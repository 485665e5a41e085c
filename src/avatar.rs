use percent_encoding::NON_ALPHANUMERIC;

/// Background colours for generated avatars; all dark enough for white initials.
pub const DARK_COLORS: [&str; 24] = [
    "1abc9c", "16a085", "27ae60", "2980b9", "8e44ad", "2c3e50",
    "d35400", "c0392b", "7f8c8d", "b03a2e", "6c3483", "1f618d",
    "117864", "196f3d", "9a7d0a", "935116", "873600", "424949",
    "0e6251", "4a235a", "154360", "641e16", "0b5345", "512e5f",
];

pub fn avatar_url(name: &str) -> String {
    let name_encoded = percent_encoding::utf8_percent_encode(name, NON_ALPHANUMERIC).to_string();
    let color = DARK_COLORS[(seahash::hash(name.as_bytes()) % (DARK_COLORS.len() as u64)) as usize];
    format!("https://ui-avatars.com/api/{}/128/{}/ffffff", name_encoded, color)
}
