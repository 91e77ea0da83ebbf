//! Database schema definitions

/// SQL to create the entity table
///
/// One table for every entity type; `id` and `name` are unique per type.
pub const CREATE_ENTITIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    entity_type TEXT NOT NULL,
    id TEXT NOT NULL,
    name TEXT NOT NULL,
    version INTEGER NOT NULL,
    document TEXT NOT NULL,
    PRIMARY KEY (entity_type, id),
    UNIQUE (entity_type, name)
)
"#;

/// SQL to create the relationship table
pub const CREATE_RELATIONSHIPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS entity_relationships (
    from_id TEXT NOT NULL,
    from_entity TEXT NOT NULL,
    to_id TEXT NOT NULL,
    to_entity TEXT NOT NULL,
    relation TEXT NOT NULL,
    UNIQUE (from_id, from_entity, to_id, to_entity, relation)
)
"#;

/// SQL to create indexes
///
/// Edges are looked up and cleaned up from either endpoint.
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_relationships_from ON entity_relationships(from_id, from_entity)",
    "CREATE INDEX IF NOT EXISTS idx_relationships_to ON entity_relationships(to_id, to_entity)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![CREATE_ENTITIES_TABLE, CREATE_RELATIONSHIPS_TABLE];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
