//! Task tags. Descriptive only; scheduling never looks at them.

/// `pulp:<type>:<id>`
pub fn resource_tag(resource_type: &str, resource_id: &str) -> String {
    format!("pulp:{resource_type}:{resource_id}")
}

/// `pulp:action:<name>`
pub fn action_tag(action: &str) -> String {
    format!("pulp:action:{action}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_shapes() {
        assert_eq!(resource_tag("consumer", "c1"), "pulp:consumer:c1");
        assert_eq!(action_tag("bind"), "pulp:action:bind");
    }
}
