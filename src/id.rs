use chrono::Utc;

pub fn new_id(prefix: &str) -> String {
    let ts = Utc::now().timestamp_millis();
    let rand: u64 = rand::random();
    format!("{}_{}_{}", prefix, ts, rand)
}

/// Short form of an id for log prefixes: the random tail, 6 hex digits.
pub fn short_id(id: &str) -> String {
    let tail = id.rsplit('_').next().unwrap_or(id);
    match tail.parse::<u64>() {
        Ok(n) => format!("{:06x}", n & 0xff_ffff),
        Err(_) => tail.chars().take(6).collect(),
    }
}
