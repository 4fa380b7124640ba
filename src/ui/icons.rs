pub struct Icons;

impl Icons {
    pub const ROCKET: &str = "🚀";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const PERSON: &str = "👤";
    pub const NOTE: &str = "📝";
    pub const FOLDER: &str = "📂";
    pub const UP: &str = "⬆️";
    pub const DOWN: &str = "⬇️";
    pub const PENDING: &str = "⏳";
    pub const STOP: &str = "⛔";
}
