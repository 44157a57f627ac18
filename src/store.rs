//! Path-addressed reads and copy-on-write updates of the field tree.
//!
//! Every update rebuilds only the chain of maps from the root to the edited
//! node; all other nodes are shared with the input tree, which is never
//! modified. Writes never create structure: a path that names a missing field
//! or walks through a node of the wrong kind is rejected with a [`PathError`].
//!
//! Array items hold plain values, not nodes. A path into an item
//! (`categoryGroups.0.name`) writes the item's value; loading flags and option
//! lists of item children live on the array's template and are shared by all
//! items, so `categoryGroups.0.name` and `categoryGroups.name` address the same
//! template node for those properties.

use serde_json::Value;

use crate::error::PathError;
use crate::path::{parse_address, FieldPath, Segment, Target};
use crate::types::{FieldBody, FieldNode, FieldTree, Fields, Item, SelectOption};

enum Edit {
    Value(Value),
    Loading(bool),
    Options(Vec<SelectOption>),
}

impl Edit {
    fn target(&self) -> Target {
        match self {
            Edit::Value(_) => Target::Value,
            Edit::Loading(_) => Target::Loading,
            Edit::Options(_) => Target::Options,
        }
    }
}

impl FieldTree {
    /// Set the value at `path`, returning the new tree.
    ///
    /// # Errors
    ///
    /// Returns `PathError` when `path` does not resolve to a scalar field, an
    /// array field, an array item, or an item child. Array values must be
    /// arrays of objects and item values must be objects.
    pub fn set_value(&self, path: &FieldPath, value: Value) -> Result<FieldTree, PathError> {
        self.rewrite(path, Edit::Value(value))
    }

    /// Set the loading flag of the node at `path`.
    pub fn set_loading(&self, path: &FieldPath, loading: bool) -> Result<FieldTree, PathError> {
        self.rewrite(path, Edit::Loading(loading))
    }

    /// Replace the option list of the node at `path`.
    pub fn set_options(
        &self,
        path: &FieldPath,
        options: Vec<SelectOption>,
    ) -> Result<FieldTree, PathError> {
        self.rewrite(path, Edit::Options(options))
    }

    /// Value stored at `path`, or `None` when the path does not resolve or the
    /// value is undefined.
    pub fn get_value(&self, path: &FieldPath) -> Option<Value> {
        let (name, rest) = split_root(path);
        read_value(self.fields(), name, rest)
    }

    /// Definition node at `path`. Item paths resolve to the template child.
    pub fn node_at(&self, path: &FieldPath) -> Option<&FieldNode> {
        let (name, rest) = split_root(path);
        find_node(self.fields(), name, rest)
    }

    /// Read a property through a tree address such as
    /// `fields.targeting.fields.countries.loading`.
    pub fn get_by_address(&self, address: &str) -> Option<Value> {
        let (parts, target) = parse_address(address)?;
        let path = FieldPath::parse(&parts.join(".")).ok()?;
        match target {
            Target::Value => self.get_value(&path),
            Target::Loading => self.node_at(&path).map(|node| Value::Bool(node.loading)),
            Target::Options => self
                .node_at(&path)?
                .options
                .as_ref()
                .and_then(|options| serde_json::to_value(options).ok()),
        }
    }

    fn rewrite(&self, path: &FieldPath, edit: Edit) -> Result<FieldTree, PathError> {
        let (name, rest) = split_root(path);
        let ctx = path.to_string();
        let root = rewrite_in(self.fields(), name, rest, &ctx, edit)?;
        Ok(FieldTree::new(root))
    }
}

fn split_root(path: &FieldPath) -> (&str, &[Segment]) {
    match path.segments().split_first() {
        Some((Segment::Name(name), rest)) => (name.as_str(), rest),
        // FieldPath::parse guarantees a leading name.
        _ => ("", &[]),
    }
}

fn rewrite_in(
    fields: &Fields,
    name: &str,
    rest: &[Segment],
    path: &str,
    edit: Edit,
) -> Result<Fields, PathError> {
    let node = fields.get(name).ok_or_else(|| PathError::UnknownField {
        path: path.to_string(),
        field: name.to_string(),
    })?;
    let updated = rewrite_node(node, name, rest, path, edit)?;
    Ok(fields.with(name, updated))
}

fn rewrite_node(
    node: &FieldNode,
    name: &str,
    rest: &[Segment],
    path: &str,
    edit: Edit,
) -> Result<FieldNode, PathError> {
    let mut next = node.clone();
    match (&node.body, rest) {
        (_, []) => apply(&mut next, path, edit)?,

        (FieldBody::Group { fields }, [Segment::Name(child), tail @ ..]) => {
            next.body = FieldBody::Group {
                fields: rewrite_in(fields, child, tail, path, edit)?,
            };
        }
        (FieldBody::Group { .. }, [Segment::Index(index), ..]) => {
            return Err(PathError::UnknownField {
                path: path.to_string(),
                field: index.to_string(),
            });
        }

        (FieldBody::Array { template, items }, [Segment::Index(index), tail @ ..]) => {
            let index = *index;
            if index >= items.len() {
                return Err(PathError::IndexOutOfBounds {
                    path: path.to_string(),
                    field: name.to_string(),
                    index,
                    len: items.len(),
                });
            }
            match (tail, edit) {
                ([], Edit::Value(value)) => {
                    let mut items = items.clone();
                    items[index] = into_item(value, path)?;
                    next.body = FieldBody::Array {
                        template: template.clone(),
                        items,
                    };
                }
                ([], other) => {
                    return Err(PathError::NoProperty {
                        path: path.to_string(),
                        property: other.target().as_str(),
                    });
                }
                ([Segment::Name(child)], Edit::Value(value)) => {
                    if !template.contains(child) {
                        return Err(PathError::UnknownField {
                            path: path.to_string(),
                            field: child.clone(),
                        });
                    }
                    let mut items = items.clone();
                    items[index].insert(child.clone(), value);
                    next.body = FieldBody::Array {
                        template: template.clone(),
                        items,
                    };
                }
                ([Segment::Name(child)], other) => {
                    next.body = FieldBody::Array {
                        template: rewrite_in(template, child, &[], path, other)?,
                        items: items.clone(),
                    };
                }
                ([Segment::Name(child), ..], _) => {
                    return Err(PathError::NotAContainer {
                        path: path.to_string(),
                        field: child.clone(),
                    });
                }
                ([Segment::Index(_), ..], _) => {
                    return Err(PathError::NotAContainer {
                        path: path.to_string(),
                        field: format!("{}.{}", name, index),
                    });
                }
            }
        }
        (FieldBody::Array { template, items }, [Segment::Name(child)]) => match edit {
            Edit::Value(_) => {
                return Err(PathError::MissingIndex {
                    path: path.to_string(),
                    field: name.to_string(),
                });
            }
            other => {
                next.body = FieldBody::Array {
                    template: rewrite_in(template, child, &[], path, other)?,
                    items: items.clone(),
                };
            }
        },
        (FieldBody::Array { .. }, [Segment::Name(_), _, ..]) => {
            return Err(PathError::MissingIndex {
                path: path.to_string(),
                field: name.to_string(),
            });
        }

        (FieldBody::Scalar { .. }, _) => {
            return Err(PathError::NotAContainer {
                path: path.to_string(),
                field: name.to_string(),
            });
        }
    }
    Ok(next)
}

fn apply(node: &mut FieldNode, path: &str, edit: Edit) -> Result<(), PathError> {
    match edit {
        Edit::Loading(loading) => node.loading = loading,
        Edit::Options(options) => node.options = Some(options),
        Edit::Value(value) => match &mut node.body {
            FieldBody::Scalar { value: slot, .. } => *slot = Some(value),
            FieldBody::Group { .. } => {
                return Err(PathError::NoProperty {
                    path: path.to_string(),
                    property: "value",
                });
            }
            FieldBody::Array { items, .. } => {
                let Value::Array(values) = value else {
                    return Err(PathError::NotAnItem {
                        path: path.to_string(),
                        expected: "an array of objects",
                    });
                };
                *items = values
                    .into_iter()
                    .map(|value| into_item(value, path))
                    .collect::<Result<_, _>>()?;
            }
        },
    }
    Ok(())
}

fn into_item(value: Value, path: &str) -> Result<Item, PathError> {
    match value {
        Value::Object(item) => Ok(item),
        _ => Err(PathError::NotAnItem {
            path: path.to_string(),
            expected: "an object",
        }),
    }
}

fn read_value(fields: &Fields, name: &str, rest: &[Segment]) -> Option<Value> {
    let node = fields.get(name)?;
    match (&node.body, rest) {
        (_, []) => node.value(),
        (FieldBody::Group { fields }, [Segment::Name(child), tail @ ..]) => {
            read_value(fields, child, tail)
        }
        (FieldBody::Array { items, .. }, [Segment::Index(index)]) => {
            items.get(*index).cloned().map(Value::Object)
        }
        (FieldBody::Array { items, .. }, [Segment::Index(index), Segment::Name(child)]) => {
            items.get(*index)?.get(child).cloned()
        }
        _ => None,
    }
}

fn find_node<'a>(fields: &'a Fields, name: &str, rest: &[Segment]) -> Option<&'a FieldNode> {
    let node = fields.get(name)?;
    match (&node.body, rest) {
        (_, []) => Some(node),
        (FieldBody::Group { fields }, [Segment::Name(child), tail @ ..]) => {
            find_node(fields, child, tail)
        }
        (FieldBody::Array { template, .. }, [Segment::Index(_), Segment::Name(child)])
        | (FieldBody::Array { template, .. }, [Segment::Name(child)]) => template.get(child),
        _ => None,
    }
}
