//! Field schema: flattens the nested `fields` configuration into a table.
//!
//! Every key of the hierarchy is a field. A top-level key opens a new
//! *level* (its 1-based ordinal among top-level keys); a `_properties_`
//! object inside a field tags it with that level and a *sublevel*, the
//! nesting depth of the field inside its top-level group. Levels holding a
//! single field carry no grouping and are stripped after the walk.
//!
//! Field names resolve case-insensitively, in singular or plural form.

pub mod plural;
pub mod testlist;

use crate::config::{FieldProperties, PROPERTIES_KEY};
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use testlist::{ListReader, UpdateRule};

/// Name of the synthetic field added when planned tests are included.
pub const CLASS_FIELD: &str = "Class";

/// Grouping position of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Level {
    pub level: usize,
    pub sublevel: usize,
}

/// A flattened field definition.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub level: Option<Level>,
    pub properties: FieldProperties,
    /// Loaded `update-from-file` rule, see [`FieldTable::load_update_rules`].
    pub update: Option<UpdateRule>,
}

impl FieldDef {
    fn new(name: &str) -> Self {
        FieldDef {
            name: name.to_string(),
            level: None,
            properties: FieldProperties::default(),
            update: None,
        }
    }

    pub fn is_mandatory(&self) -> bool {
        self.properties.mandatory
    }
}

/// A node of the `fields` hierarchy.
enum SchemaNode<'a> {
    Field {
        name: &'a str,
        children: Vec<SchemaNode<'a>>,
    },
    Properties(FieldProperties),
}

fn parse_nodes(map: &Map<String, Value>) -> Result<Vec<SchemaNode<'_>>> {
    let mut nodes = Vec::with_capacity(map.len());
    for (key, value) in map {
        if key == PROPERTIES_KEY {
            let props = serde_json::from_value(value.clone())
                .map_err(|e| Error::Config(format!("invalid {PROPERTIES_KEY}: {e}")))?;
            nodes.push(SchemaNode::Properties(props));
            continue;
        }
        let Value::Object(children) = value else {
            return Err(Error::Config(format!("field '{key}' must be an object")));
        };
        nodes.push(SchemaNode::Field {
            name: key,
            children: parse_nodes(children)?,
        });
    }
    Ok(nodes)
}

/// The flat, ordered field table with its alias index.
#[derive(Debug, Clone, Default)]
pub struct FieldTable {
    fields: Vec<FieldDef>,
    index: HashMap<String, usize>,
    aliases: BTreeMap<String, usize>,
}

impl FieldTable {
    /// Flatten a `fields` hierarchy. With `include_plan`, the synthetic
    /// [`CLASS_FIELD`] is appended below the deepest level-1 field.
    pub fn build(fields: &Map<String, Value>, include_plan: bool) -> Result<Self> {
        let mut table = FieldTable::default();
        let mut level_count = 0;
        table.walk(None, 0, parse_nodes(fields)?, &mut level_count)?;

        let mut max_sublevel = vec![0usize; level_count.max(1)];
        for def in &table.fields {
            if let Some(l) = def.level {
                max_sublevel[l.level - 1] = max_sublevel[l.level - 1].max(l.sublevel);
            }
        }

        if include_plan {
            max_sublevel[0] += 1;
            let idx = table.entry(CLASS_FIELD);
            table.fields[idx].level = Some(Level {
                level: 1,
                sublevel: max_sublevel[0],
            });
        }

        for def in &mut table.fields {
            if let Some(l) = def.level {
                if max_sublevel[l.level - 1] == 1 {
                    def.level = None;
                }
            }
        }

        for (i, def) in table.fields.iter().enumerate() {
            let lower = def.name.to_lowercase();
            let alias = plural::plural(&lower);
            table.aliases.insert(lower, i);
            table.aliases.insert(alias, i);
        }

        Ok(table)
    }

    fn entry(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        self.fields.push(FieldDef::new(name));
        self.index.insert(name.to_string(), self.fields.len() - 1);
        self.fields.len() - 1
    }

    fn walk(
        &mut self,
        owner: Option<&str>,
        mut sublevel: usize,
        nodes: Vec<SchemaNode<'_>>,
        level_count: &mut usize,
    ) -> Result<()> {
        for node in nodes {
            match node {
                SchemaNode::Properties(props) => {
                    let Some(owner) = owner else {
                        return Err(Error::Config(format!(
                            "{PROPERTIES_KEY} must belong to a field"
                        )));
                    };
                    sublevel += 1;
                    let idx = self.entry(owner);
                    let def = &mut self.fields[idx];
                    if let Some(previous) = def.level {
                        if previous.sublevel != sublevel {
                            return Err(Error::SublevelConflict {
                                field: owner.to_string(),
                                previous: previous.sublevel,
                                requested: sublevel,
                            });
                        }
                    }
                    def.properties.merge(props);
                    def.level = Some(Level {
                        level: *level_count,
                        sublevel,
                    });
                }
                SchemaNode::Field { name, children } => {
                    self.entry(name);
                    if owner.is_none() {
                        *level_count += 1;
                    }
                    self.walk(Some(name), sublevel, children, level_count)?;
                }
            }
        }
        Ok(())
    }

    /// Resolve a raw field token (any case, singular or plural) to its
    /// canonical name.
    pub fn resolve(&self, raw: &str) -> Option<&str> {
        self.aliases
            .get(&raw.to_lowercase())
            .map(|&i| self.fields[i].name.as_str())
    }

    /// Like [`resolve`](Self::resolve), failing on unknown names.
    pub fn require(&self, raw: &str) -> Result<&str> {
        self.resolve(raw)
            .ok_or_else(|| Error::UnknownField(raw.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Read the list files of every `update-from-file` rule. Paths are
    /// relative to `dir`.
    pub fn load_update_rules(&mut self, dir: &Path, reader: &ListReader) -> Result<()> {
        for def in &mut self.fields {
            let Some(rule) = def.properties.update_from_file.as_ref() else {
                continue;
            };
            let include_type = rule
                .include_type
                .or(def.properties.include_type)
                .unwrap_or_default();
            let exclude_type = rule
                .exclude_type
                .or(def.properties.exclude_type)
                .unwrap_or_default();
            def.update = Some(testlist::compile(
                rule,
                include_type,
                exclude_type,
                dir,
                reader,
            )?);
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn set_update_rule(&mut self, name: &str, rule: UpdateRule) {
        if let Some(&idx) = self.index.get(name) {
            self.fields[idx].update = Some(rule);
        }
    }

    /// Fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter()
    }

    /// Fields ordered for output: leveled fields by (level, sublevel)
    /// first, then the remaining ones by name.
    pub fn sorted_by_level(&self) -> Vec<&FieldDef> {
        let mut sorted: Vec<&FieldDef> = self.fields.iter().collect();
        sorted.sort_by(|a, b| {
            (a.level.is_none(), a.level, &a.name).cmp(&(b.level.is_none(), b.level, &b.name))
        });
        sorted
    }

    pub fn mandatory_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.is_mandatory())
            .map(|f| f.name.as_str())
    }
}
