//! Query canonicalization
//!
//! Detects what shape a user query has (`self.foo()`, `User().bar()`,
//! `mod.sub.Class.m`, `var.m()`) and splits it into receiver and member so
//! the instance tools can resolve it against the index. Patterns are checked
//! in a fixed order; each carries the confidence of its canonicalization.

use regex::Regex;

/// What kind of expression a query looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPattern {
    SelfCall,
    InlineInstantiation,
    StaticMethod,
    DirectFqn,
    InstanceCall,
    ChainedCall,
    Unknown,
}

impl QueryPattern {
    pub fn name(&self) -> &'static str {
        match self {
            QueryPattern::SelfCall => "self_call",
            QueryPattern::InlineInstantiation => "inline_instantiation",
            QueryPattern::StaticMethod => "static_method",
            QueryPattern::DirectFqn => "direct_fqn",
            QueryPattern::InstanceCall => "instance_call",
            QueryPattern::ChainedCall => "chained_call",
            QueryPattern::Unknown => "unknown",
        }
    }
}

/// A detected query, split into its parts.
#[derive(Debug, Clone)]
pub struct DetectedQuery {
    pub pattern: QueryPattern,
    pub confidence: f32,
    /// Receiver text: `self`, a class name, a variable, or a dotted prefix.
    pub receiver: Option<String>,
    /// Member being called or accessed.
    pub member: Option<String>,
}

pub struct QueryResolver {
    self_call: Regex,
    inline_instantiation: Regex,
    static_method: Regex,
    instance_call: Regex,
}

impl Default for QueryResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryResolver {
    pub fn new() -> Self {
        // The patterns are fixed; compilation cannot fail.
        QueryResolver {
            self_call: Regex::new(r"^self\.(\w+)(\(\))?$").unwrap(),
            inline_instantiation: Regex::new(r"^([A-Z]\w*)\(\)\.(\w+)(\(\))?$").unwrap(),
            static_method: Regex::new(r"^([A-Z]\w*)\.(\w+)(\(\))?$").unwrap(),
            instance_call: Regex::new(r"^([a-z_]\w*)\.(\w+)(\(\))?$").unwrap(),
        }
    }

    /// Classify a query string. Checked in spec order; first match wins.
    pub fn detect(&self, query: &str) -> DetectedQuery {
        let query = query.trim();

        if let Some(caps) = self.self_call.captures(query) {
            return DetectedQuery {
                pattern: QueryPattern::SelfCall,
                confidence: 0.95,
                receiver: Some("self".to_string()),
                member: Some(caps[1].to_string()),
            };
        }
        if let Some(caps) = self.inline_instantiation.captures(query) {
            return DetectedQuery {
                pattern: QueryPattern::InlineInstantiation,
                confidence: 0.90,
                receiver: Some(caps[1].to_string()),
                member: Some(caps[2].to_string()),
            };
        }
        if let Some(caps) = self.static_method.captures(query) {
            return DetectedQuery {
                pattern: QueryPattern::StaticMethod,
                confidence: 0.95,
                receiver: Some(caps[1].to_string()),
                member: Some(caps[2].to_string()),
            };
        }
        let segments: Vec<&str> = query.split('.').collect();
        if segments.len() >= 3 && !query.contains('(') && segments.iter().all(|s| !s.is_empty()) {
            let (member, receiver) = match query.rsplit_once('.') {
                Some((prefix, leaf)) => (Some(leaf.to_string()), Some(prefix.to_string())),
                None => (None, None),
            };
            return DetectedQuery {
                pattern: QueryPattern::DirectFqn,
                confidence: 1.0,
                receiver,
                member,
            };
        }
        if let Some(caps) = self.instance_call.captures(query) {
            return DetectedQuery {
                pattern: QueryPattern::InstanceCall,
                confidence: 0.85,
                receiver: Some(caps[1].to_string()),
                member: Some(caps[2].to_string()),
            };
        }
        if segments.len() >= 2
            && segments
                .iter()
                .all(|s| !s.is_empty() && s.chars().next().map(char::is_lowercase).unwrap_or(false))
        {
            let stripped = query.trim_end_matches("()");
            let (receiver, member) = match stripped.rsplit_once('.') {
                Some((prefix, leaf)) => (Some(prefix.to_string()), Some(leaf.to_string())),
                None => (None, None),
            };
            return DetectedQuery {
                pattern: QueryPattern::ChainedCall,
                confidence: 0.70,
                receiver,
                member,
            };
        }
        DetectedQuery {
            pattern: QueryPattern::Unknown,
            confidence: 0.0,
            receiver: None,
            member: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(q: &str) -> DetectedQuery {
        QueryResolver::new().detect(q)
    }

    #[test]
    fn self_calls() {
        let d = detect("self.foo()");
        assert_eq!(d.pattern, QueryPattern::SelfCall);
        assert_eq!(d.member.as_deref(), Some("foo"));
        assert_eq!(d.confidence, 0.95);
        assert_eq!(detect("self.bar").pattern, QueryPattern::SelfCall);
    }

    #[test]
    fn inline_instantiations() {
        let d = detect("User().bar()");
        assert_eq!(d.pattern, QueryPattern::InlineInstantiation);
        assert_eq!(d.receiver.as_deref(), Some("User"));
        assert_eq!(d.member.as_deref(), Some("bar"));
        assert_eq!(d.confidence, 0.90);
    }

    #[test]
    fn static_methods() {
        let d = detect("Config.load()");
        assert_eq!(d.pattern, QueryPattern::StaticMethod);
        assert_eq!(d.receiver.as_deref(), Some("Config"));
        assert_eq!(d.confidence, 0.95);
    }

    #[test]
    fn direct_fqns_beat_chains() {
        let d = detect("mod.sub.Class.m");
        assert_eq!(d.pattern, QueryPattern::DirectFqn);
        assert_eq!(d.confidence, 1.0);
        assert_eq!(d.member.as_deref(), Some("m"));
        assert_eq!(d.receiver.as_deref(), Some("mod.sub.Class"));
    }

    #[test]
    fn instance_calls() {
        let d = detect("service.get_user()");
        assert_eq!(d.pattern, QueryPattern::InstanceCall);
        assert_eq!(d.receiver.as_deref(), Some("service"));
        assert_eq!(d.member.as_deref(), Some("get_user"));
        assert_eq!(d.confidence, 0.85);
    }

    #[test]
    fn chained_calls() {
        let d = detect("app.service.run()");
        assert_eq!(d.pattern, QueryPattern::ChainedCall);
        assert_eq!(d.confidence, 0.70);
        assert_eq!(d.receiver.as_deref(), Some("app.service"));
        assert_eq!(d.member.as_deref(), Some("run"));
    }

    #[test]
    fn unknowns() {
        assert_eq!(detect("???").pattern, QueryPattern::Unknown);
        assert_eq!(detect("").pattern, QueryPattern::Unknown);
        assert_eq!(detect("lone").pattern, QueryPattern::Unknown);
    }
}
