use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_graphql_parser::{
    types::{
        Directive, DocumentOperations, ExecutableDocument, Field, FragmentDefinition, OperationDefinition,
        OperationType, Selection, SelectionSet,
    },
    Positioned,
};
use async_graphql_value::{ConstValue, Name, Variables};
use indexmap::IndexMap;

use super::{
    complexity::{ComplexityCalculator, FieldComplexities},
    BoundField, ChildPlan, CompileError, ExecutionPlan, FieldDirective, FieldPlan, FieldPlanKind, SelectionSetPlan,
};
use crate::{
    bindings::{Binding, BindingTable},
    config::Config,
    error::Location,
    execution::InputCoercion,
    registry::{MetaType, Registry},
    resolvers::Arguments,
    scalars::ScalarRegistry,
    value::TYPENAME_KEY,
};

type Fragments = HashMap<Name, Positioned<FragmentDefinition>>;

/// Turns an executable document into an [`ExecutionPlan`].
///
/// Fragments are expanded and `@skip` / `@include` are evaluated here, so a plan is specific to
/// the variables it was compiled with.
pub struct PlanCompiler<'a> {
    registry: &'a Registry,
    bindings: &'a BindingTable,
    config: &'a Config,
    scalars: &'a ScalarRegistry,
    complexities: Option<&'a FieldComplexities>,
}

impl<'a> PlanCompiler<'a> {
    pub fn new(
        registry: &'a Registry,
        bindings: &'a BindingTable,
        config: &'a Config,
        scalars: &'a ScalarRegistry,
    ) -> Self {
        PlanCompiler {
            registry,
            bindings,
            config,
            scalars,
            complexities: None,
        }
    }

    /// Custom field costs used for [`ExecutionPlan::complexity`].
    #[must_use]
    pub(crate) fn with_complexities(mut self, complexities: &'a FieldComplexities) -> Self {
        self.complexities = Some(complexities);
        self
    }

    pub fn compile_query(
        &self,
        query: &str,
        operation_name: Option<&str>,
        variables: Variables,
    ) -> Result<ExecutionPlan, CompileError> {
        let document = async_graphql_parser::parse_query(query).map_err(|error| CompileError::Parse(error.to_string()))?;
        self.compile(&document, operation_name, variables)
    }

    pub fn compile(
        &self,
        document: &ExecutableDocument,
        operation_name: Option<&str>,
        variables: Variables,
    ) -> Result<ExecutionPlan, CompileError> {
        let (name, operation) = select_operation(document, operation_name)?;
        let operation_type = operation.node.ty;
        let root_type = self
            .registry
            .root_type(operation_type)
            .ok_or(CompileError::UnsupportedOperation(operation_type))?;

        check_fragment_cycles(&document.fragments)?;

        let variables = InputCoercion::for_variables(self.registry, self.scalars)
            .coerce_variables(&operation.node.variable_definitions, variables)
            .map_err(CompileError::InvalidVariable)?;

        let context = CompileContext {
            compiler: self,
            fragments: &document.fragments,
            variables: &variables,
            declared_variables: declared_variables(&operation.node),
        };
        let root = context.selection_set(
            root_type,
            &[&operation.node.selection_set.node],
            operation_type == OperationType::Mutation,
        )?;

        if operation_type == OperationType::Subscription && !is_subscription_root(&root) {
            return Err(CompileError::InvalidSubscriptionRoot);
        }

        let complexity = ComplexityCalculator::new(self.complexities).selection_set(&root);
        tracing::debug!(
            "compiled {} {} with complexity {}: {}",
            super::operation_name(operation_type),
            name.as_deref().unwrap_or("(anonymous)"),
            complexity,
            root
        );

        Ok(ExecutionPlan {
            operation_type,
            operation_name: name,
            root,
            complexity,
        })
    }
}

fn select_operation<'d>(
    document: &'d ExecutableDocument,
    name: Option<&str>,
) -> Result<(Option<String>, &'d Positioned<OperationDefinition>), CompileError> {
    match (&document.operations, name) {
        (DocumentOperations::Single(operation), None) => Ok((None, operation)),
        (DocumentOperations::Single(_), Some(name)) => Err(CompileError::UnknownOperation(name.to_string())),
        (DocumentOperations::Multiple(operations), Some(name)) => operations
            .get_key_value(name)
            .map(|(name, operation)| (Some(name.to_string()), operation))
            .ok_or_else(|| CompileError::UnknownOperation(name.to_string())),
        (DocumentOperations::Multiple(operations), None) if operations.len() == 1 => operations
            .iter()
            .next()
            .map(|(name, operation)| (Some(name.to_string()), operation))
            .ok_or(CompileError::OperationNameRequired),
        (DocumentOperations::Multiple(_), None) => Err(CompileError::OperationNameRequired),
    }
}

fn declared_variables(operation: &OperationDefinition) -> HashSet<Name> {
    operation
        .variable_definitions
        .iter()
        .map(|definition| definition.node.name.node.clone())
        .collect()
}

fn is_subscription_root(root: &SelectionSetPlan) -> bool {
    matches!(
        root.fields.as_slice(),
        [FieldPlan {
            kind: FieldPlanKind::Bound(BoundField {
                binding: Binding::Subscription { .. },
                ..
            }),
            ..
        }]
    )
}

fn check_fragment_cycles(fragments: &Fragments) -> Result<(), CompileError> {
    fn spreads<'a>(selection_set: &'a SelectionSet, out: &mut Vec<&'a str>) {
        for selection in &selection_set.items {
            match &selection.node {
                Selection::Field(field) => spreads(&field.node.selection_set.node, out),
                Selection::FragmentSpread(spread) => out.push(spread.node.fragment_name.node.as_str()),
                Selection::InlineFragment(fragment) => spreads(&fragment.node.selection_set.node, out),
            }
        }
    }

    fn visit<'a>(
        name: &'a str,
        fragments: &'a Fragments,
        stack: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Result<(), CompileError> {
        if done.contains(name) {
            return Ok(());
        }
        if stack.contains(&name) {
            return Err(CompileError::FragmentCycle(name.to_string()));
        }
        // Unknown fragments are reported where they are spread.
        let Some(fragment) = fragments.get(name) else {
            return Ok(());
        };

        stack.push(name);
        let mut children = Vec::new();
        spreads(&fragment.node.selection_set.node, &mut children);
        for child in children {
            visit(child, fragments, stack, done)?;
        }
        stack.pop();
        done.insert(name);
        Ok(())
    }

    let mut done = HashSet::new();
    for name in fragments.keys() {
        visit(name.as_str(), fragments, &mut Vec::new(), &mut done)?;
    }
    Ok(())
}

struct CompileContext<'a> {
    compiler: &'a PlanCompiler<'a>,
    fragments: &'a Fragments,
    variables: &'a Variables,
    declared_variables: HashSet<Name>,
}

type CollectedFields<'d> = IndexMap<Name, Vec<&'d Positioned<Field>>>;

impl<'a> CompileContext<'a> {
    fn selection_set(
        &self,
        type_name: &str,
        selection_sets: &[&'a SelectionSet],
        serial: bool,
    ) -> Result<SelectionSetPlan, CompileError> {
        let mut collected = CollectedFields::new();
        let mut visited_fragments = HashSet::new();
        for selection_set in selection_sets {
            self.collect_fields(type_name, selection_set, &mut collected, &mut visited_fragments)?;
        }

        let fields = collected
            .into_iter()
            .map(|(response_key, fields)| self.field(type_name, response_key, &fields))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SelectionSetPlan {
            type_name: type_name.to_string(),
            fields,
            concurrent: !serial && !self.compiler.config.is_concurrency_disabled(type_name),
        })
    }

    /// Flattens fragments applying to `type_name`, grouping fields by response key.
    fn collect_fields(
        &self,
        type_name: &str,
        selection_set: &'a SelectionSet,
        collected: &mut CollectedFields<'a>,
        visited_fragments: &mut HashSet<&'a str>,
    ) -> Result<(), CompileError> {
        let registry = self.compiler.registry;

        for selection in &selection_set.items {
            if self.is_skipped(selection.node.directives()) {
                continue;
            }

            match &selection.node {
                Selection::Field(field) => {
                    collected
                        .entry(field.node.response_key().node.clone())
                        .or_default()
                        .push(field);
                }
                Selection::InlineFragment(fragment) => {
                    let applies = match &fragment.node.type_condition {
                        Some(condition) => registry.type_condition_matches(&condition.node.on.node, type_name),
                        None => true,
                    };
                    if applies {
                        self.collect_fields(type_name, &fragment.node.selection_set.node, collected, visited_fragments)?;
                    }
                }
                Selection::FragmentSpread(spread) => {
                    let name = spread.node.fragment_name.node.as_str();
                    if !visited_fragments.insert(name) {
                        continue;
                    }
                    let fragment = self
                        .fragments
                        .get(name)
                        .ok_or_else(|| CompileError::UnknownFragment(name.to_string()))?;
                    if registry.type_condition_matches(&fragment.node.type_condition.node.on.node, type_name) {
                        self.collect_fields(type_name, &fragment.node.selection_set.node, collected, visited_fragments)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn is_skipped(&self, directives: &[Positioned<Directive>]) -> bool {
        for directive in directives {
            let include = match directive.node.name.node.as_str() {
                "skip" => false,
                "include" => true,
                _ => continue,
            };

            if let Some(condition) = directive.node.get_argument("if") {
                let value = condition
                    .node
                    .clone()
                    .into_const_with(|name| self.variables.get(&name).cloned().ok_or(()))
                    .unwrap_or_default();
                if include != matches!(value, ConstValue::Boolean(true)) {
                    return true;
                }
            }
        }

        false
    }

    fn field(
        &self,
        type_name: &str,
        response_key: Name,
        fields: &[&'a Positioned<Field>],
    ) -> Result<FieldPlan, CompileError> {
        let Some((first, others)) = fields.split_first() else {
            return Err(CompileError::Unmergeable {
                response_key: response_key.to_string(),
                reason: "no field selected".to_string(),
            });
        };
        let field_name = first.node.name.node.as_str();
        let coordinate = format!("{type_name}.{field_name}");
        let locations: Arc<[Location]> = fields.iter().map(|field| Location::from(field.pos)).collect();

        let arguments = self.arguments(first)?;
        for other in others {
            if other.node.name.node != first.node.name.node {
                return Err(CompileError::Unmergeable {
                    response_key: response_key.to_string(),
                    reason: format!("`{field_name}` and `{}` are different fields", other.node.name.node),
                });
            }
            if self.arguments(other)? != arguments {
                return Err(CompileError::Unmergeable {
                    response_key: response_key.to_string(),
                    reason: "they have different arguments".to_string(),
                });
            }
        }

        if field_name == TYPENAME_KEY {
            return Ok(FieldPlan {
                response_key,
                field_name: first.node.name.node.clone(),
                coordinate,
                locations,
                kind: FieldPlanKind::Typename,
            });
        }

        let registry = self.compiler.registry;
        let unknown_field = || CompileError::UnknownField {
            type_name: type_name.to_string(),
            field: field_name.to_string(),
        };
        let meta_field = registry.field(type_name, field_name).ok_or_else(unknown_field)?;

        if let Some(argument) = arguments.keys().find(|name| !meta_field.args.contains_key(name.as_str())) {
            return Err(CompileError::UnknownArgument {
                type_name: type_name.to_string(),
                field: field_name.to_string(),
                argument: argument.to_string(),
            });
        }

        let binding = self
            .compiler
            .bindings
            .get(type_name, field_name)
            .cloned()
            .ok_or_else(|| CompileError::Unbound {
                type_name: type_name.to_string(),
                field: field_name.to_string(),
            })?;

        let selection_sets = fields
            .iter()
            .map(|field| &field.node.selection_set.node)
            .collect::<Vec<_>>();
        let has_selection = selection_sets.iter().any(|set| !set.items.is_empty());

        let target_name = meta_field.ty.named_type();
        let target = registry.lookup(target_name).ok_or_else(unknown_field)?;
        let child = match target {
            MetaType::Scalar(_) | MetaType::Enum(_) if has_selection => {
                return Err(CompileError::LeafSelection {
                    type_name: type_name.to_string(),
                    field: field_name.to_string(),
                });
            }
            MetaType::Scalar(_) | MetaType::Enum(_) => ChildPlan::Leaf,
            _ if !has_selection => {
                return Err(CompileError::MissingSelection {
                    type_name: type_name.to_string(),
                    field: field_name.to_string(),
                    ty: meta_field.ty.to_string(),
                });
            }
            MetaType::Object(_) => ChildPlan::Object(self.selection_set(target_name, &selection_sets, false)?),
            _ => ChildPlan::Dispatch(
                registry
                    .possible_types(target_name)
                    .map(|possible_type| {
                        self.selection_set(possible_type, &selection_sets, false)
                            .map(|plan| (possible_type.to_string(), plan))
                    })
                    .collect::<Result<_, CompileError>>()?,
            ),
        };

        let directives = meta_field
            .directives
            .iter()
            .filter(|directive| registry.is_schema_directive(&directive.name))
            .map(|directive| FieldDirective {
                name: directive.name.clone(),
                arguments: Arguments::new(directive.arguments.clone()),
            })
            .collect();

        Ok(FieldPlan {
            response_key,
            field_name: first.node.name.node.clone(),
            coordinate,
            locations,
            kind: FieldPlanKind::Bound(BoundField {
                ty: meta_field.ty.clone(),
                binding,
                arguments,
                argument_definitions: meta_field.args.clone(),
                directives,
                child,
            }),
        })
    }

    /// Substitutes variables. An argument given as an unset variable is left absent.
    fn arguments(&self, field: &Positioned<Field>) -> Result<IndexMap<Name, ConstValue>, CompileError> {
        let mut arguments = IndexMap::with_capacity(field.node.arguments.len());

        for (name, value) in &field.node.arguments {
            if let async_graphql_value::Value::Variable(variable) = &value.node {
                if !self.variables.contains_key(variable) && self.declared_variables.contains(variable) {
                    continue;
                }
            }

            let value = value.node.clone().into_const_with(|variable| {
                match self.variables.get(&variable) {
                    Some(value) => Ok(value.clone()),
                    None if self.declared_variables.contains(&variable) => Ok(ConstValue::Null),
                    None => Err(CompileError::UndefinedVariable(variable.to_string())),
                }
            })?;
            arguments.insert(name.node.clone(), value);
        }

        Ok(arguments)
    }
}
