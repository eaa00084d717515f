//! rewriting and pruning of condition trees

use super::field::Resource;
use super::types::{Condition, ConditionGroup, ConditionType};

/// walks a condition tree, producing a rewritten tree
///
/// returning `None` from a visit removes that node from its parent group.
/// the default methods keep every leaf and rebuild every group from its
/// surviving children.
pub trait ConditionVisitor {
    fn visit(&mut self, condition: ConditionType) -> Option<ConditionType> {
        match condition {
            ConditionType::Condition(c) => self.visit_condition(c),
            ConditionType::Group(g) => self.visit_condition_group(g),
        }
    }

    fn visit_condition(&mut self, condition: Condition) -> Option<ConditionType> {
        Some(condition.into())
    }

    fn visit_condition_group(&mut self, group: ConditionGroup) -> Option<ConditionType> {
        walk_group(self, group)
    }
}

/// visit every child of `group`, dropping the group if no child survives
pub fn walk_group<V>(visitor: &mut V, group: ConditionGroup) -> Option<ConditionType>
where
    V: ConditionVisitor + ?Sized,
{
    let (operator, conditions) = group.into_parts();
    let kept: Vec<ConditionType> = conditions
        .into_iter()
        .filter_map(|c| visitor.visit(c))
        .collect();

    ConditionGroup::new(operator, kept).ok().map(Into::into)
}

/// keeps conditions that target one resource, or no resource at all
#[derive(Debug, Clone, Copy)]
pub struct ResourceScope {
    resource: Resource,
}

impl ResourceScope {
    pub fn new(resource: Resource) -> Self {
        Self { resource }
    }

    /// scope `condition` to this resource, `None` if nothing applies
    pub fn apply(mut self, condition: ConditionType) -> Option<ConditionType> {
        self.visit(condition)
    }
}

impl ConditionVisitor for ResourceScope {
    fn visit_condition(&mut self, condition: Condition) -> Option<ConditionType> {
        match condition.target().resource {
            None => Some(condition.into()),
            Some(resource) if resource == self.resource => Some(condition.into()),
            Some(_) => None,
        }
    }
}
