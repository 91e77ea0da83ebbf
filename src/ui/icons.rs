pub struct Icons;

impl Icons {
    pub const CATALOG: &str = "📚";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const LINK: &str = "🔗";
    pub const NEW: &str = "✨";
    pub const MOD: &str = "📝";
    pub const DEL: &str = "🗑️";
    pub const DATABASE: &str = "🗄️";
    pub const RIGHT: &str = "➡️";
    pub const GEAR: &str = "⚙️";
    pub const EMPTY: &str = "∅";
}
