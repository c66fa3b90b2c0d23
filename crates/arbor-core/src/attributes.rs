//! Per-class attribute registry built during indexing

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{ClassAttribute, ClassAttributes};

/// Maps class FQNs to their attribute tables.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AttributeRegistry {
    classes: HashMap<String, ClassAttributes>,
}

impl AttributeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one attribute for a class, creating the class entry on first
    /// sight. A later assignment with higher confidence replaces an earlier
    /// weaker one; equal or lower confidence keeps the first sighting.
    pub fn register_attribute(
        &mut self,
        class_fqn: &str,
        file: &Path,
        attribute: ClassAttribute,
    ) {
        let entry = self
            .classes
            .entry(class_fqn.to_string())
            .or_insert_with(|| ClassAttributes::new(class_fqn, file));
        match entry.attributes.get(&attribute.name) {
            Some(existing) if existing.confidence >= attribute.confidence => {}
            _ => {
                entry.attributes.insert(attribute.name.clone(), attribute);
            }
        }
    }

    /// Record a method FQN under its class.
    pub fn register_method(&mut self, class_fqn: &str, file: &Path, method_fqn: &str) {
        let entry = self
            .classes
            .entry(class_fqn.to_string())
            .or_insert_with(|| ClassAttributes::new(class_fqn, file));
        if !entry.methods.iter().any(|m| m == method_fqn) {
            entry.methods.push(method_fqn.to_string());
        }
    }

    pub fn class(&self, class_fqn: &str) -> Option<&ClassAttributes> {
        self.classes.get(class_fqn)
    }

    pub fn attribute(&self, class_fqn: &str, name: &str) -> Option<&ClassAttribute> {
        self.classes.get(class_fqn)?.attributes.get(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassAttributes> {
        self.classes.values()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Type;
    use std::path::PathBuf;

    #[test]
    fn register_and_lookup() {
        let mut reg = AttributeRegistry::new();
        let file = PathBuf::from("/p/myapp/service.py");
        reg.register_attribute(
            "myapp.service.UserService",
            &file,
            ClassAttribute::new("repo", Some(Type::concrete("myapp.repo.UserRepo", 0.85))),
        );
        let attr = reg.attribute("myapp.service.UserService", "repo").unwrap();
        assert_eq!(attr.ty.as_ref().unwrap().fqn(), Some("myapp.repo.UserRepo"));
        assert_eq!(attr.confidence, 0.85);
    }

    #[test]
    fn stronger_inference_replaces_weaker() {
        let mut reg = AttributeRegistry::new();
        let file = PathBuf::from("/p/a.py");
        reg.register_attribute(
            "a.C",
            &file,
            ClassAttribute::new("x", Some(Type::concrete("a.Weak", 0.70))),
        );
        reg.register_attribute(
            "a.C",
            &file,
            ClassAttribute::new("x", Some(Type::concrete("a.Strong", 0.95))),
        );
        let attr = reg.attribute("a.C", "x").unwrap();
        assert_eq!(attr.ty.as_ref().unwrap().fqn(), Some("a.Strong"));
    }

    #[test]
    fn confidence_mirrors_type_confidence() {
        let attr = ClassAttribute::new("x", Some(Type::concrete("a.B", 0.7)));
        assert_eq!(attr.confidence, attr.ty.as_ref().unwrap().confidence());
    }
}
