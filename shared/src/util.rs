use rand::Rng;

/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Unambiguous alphabet for codes people type on a phone (no 0/O, 1/I)
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

fn random_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Generate a 6-character room code
pub fn generate_room_code() -> String {
    random_code(6)
}

/// Generate a device id of the form `DEV-XXXXXX`
pub fn generate_device_id() -> String {
    format!("DEV-{}", random_code(6))
}
