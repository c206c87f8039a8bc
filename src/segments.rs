use crate::types::{EntityId, TYPE_PROPERTY};

/// Naming segments of an entity: domain, then the `type` value if present,
/// then every other property value in its original order.
pub fn name_segments(id: &EntityId) -> Vec<String> {
    let mut segments = Vec::with_capacity(id.properties().len() + 1);
    segments.push(id.domain().to_string());
    if let Some(kind) = id.kind() {
        segments.push(kind.to_string());
    }
    segments.extend(
        id.properties()
            .iter()
            .filter(|(key, _)| key != TYPE_PROPERTY)
            .map(|(_, value)| value.clone()),
    );
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        type_first = { "org.foo:type=Bar,name=X", &["org.foo", "Bar", "X"] },
        type_last = { "org.foo:name=X,area=a,type=Bar", &["org.foo", "Bar", "X", "a"] },
        no_type = { "org.foo:name=X,area=a", &["org.foo", "X", "a"] },
        only_type = { "java.lang:type=Memory", &["java.lang", "Memory"] },
    )]
    fn test_name_segments(id: &str, expected: &[&str]) {
        let id: EntityId = id.parse().unwrap();
        assert_eq!(name_segments(&id), expected);
    }
}
