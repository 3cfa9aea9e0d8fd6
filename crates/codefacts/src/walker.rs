//! Tree walker: one pass over a parsed compilation unit, producing the
//! interleaved entity/relation fact stream.
//!
//! The walk is two-phase. A pre-scan ([`scan_unit`]) builds the unit's
//! resolution context - package, imports, and descriptors for every named
//! type declared in the unit - so forward references resolve without a
//! fixpoint. The main walk then registers entities, maintains the scope
//! stack, and emits relations in first-observed order.
//!
//! Emission conventions: an entity fact is immediately followed by its
//! INSIDE relation; a semantic relation (EXTENDS, RETURNS, CALLS on `new`)
//! precedes the USES facts for the type reference that produced it; USES is
//! emitted once per resolvable segment of a qualified type reference, with
//! unresolvable package prefixes skipped and the final segment always kept.

use tree_sitter::Node;

use crate::classpath::{FieldDescriptor, MethodDescriptor, TypeDescriptor, TypeIndex};
use crate::parse::{find_child_by_kind, named_children, node_text, ParsedUnit};
use crate::registry::{
    callable_fqn, member_fqn, nested_type_fqn, top_level_type_fqn, EntityRegistry,
};
use crate::relations::RelationCollector;
use crate::resolver::{strip_generics, LocalBinding, Resolver, ScopeStack, UnitScope};
use crate::{EntityKind, Fact, Modifier, Reference, Relation, RelationKind, DEFAULT_PACKAGE};

const TYPE_DECLARATION_KINDS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "annotation_type_declaration",
    "record_declaration",
];

const TYPE_NODE_KINDS: &[&str] = &[
    "type_identifier",
    "scoped_type_identifier",
    "generic_type",
    "array_type",
    "integral_type",
    "floating_point_type",
    "boolean_type",
    "void_type",
];

const EXPRESSION_KINDS: &[&str] = &[
    "identifier",
    "field_access",
    "array_access",
    "method_invocation",
    "object_creation_expression",
    "array_creation_expression",
    "assignment_expression",
    "binary_expression",
    "unary_expression",
    "update_expression",
    "cast_expression",
    "instanceof_expression",
    "ternary_expression",
    "lambda_expression",
    "parenthesized_expression",
    "method_reference",
    "class_literal",
];

fn is_type_declaration(kind: &str) -> bool {
    TYPE_DECLARATION_KINDS.contains(&kind)
}

fn is_type_node(kind: &str) -> bool {
    TYPE_NODE_KINDS.contains(&kind)
}

/// Whether the nearest enclosing type declaration of `node` is an enum.
fn enclosing_type_is_enum(node: &Node) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if is_type_declaration(parent.kind()) {
            return parent.kind() == "enum_declaration";
        }
        current = parent.parent();
    }
    false
}

/// What a receiver chain resolved to: a type (static access), a value of a
/// known or unknown type, or nothing usable.
enum ChainResult {
    Type(String),
    Value(Option<String>),
    Unknown,
}

/// A formal parameter (or record component) as declared.
struct ParamInfo<'t> {
    node: Node<'t>,
    name: String,
    ty_node: Option<Node<'t>>,
    /// Declared type text, array dimensions and varargs `[]` folded in
    ty_text: String,
}

fn parameter_infos<'t>(declaration: &Node<'t>, source: &str) -> Vec<ParamInfo<'t>> {
    let Some(params) = declaration.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for p in named_children(&params) {
        match p.kind() {
            "formal_parameter" => {
                let Some(name_node) = p.child_by_field_name("name") else {
                    continue;
                };
                let ty_node = p.child_by_field_name("type");
                let dims = p
                    .child_by_field_name("dimensions")
                    .map(|d| node_text(&d, source).split_whitespace().collect::<String>())
                    .unwrap_or_default();
                let ty_text = ty_node
                    .map(|t| format!("{}{}", node_text(&t, source), dims))
                    .unwrap_or_default();
                out.push(ParamInfo {
                    node: p,
                    name: node_text(&name_node, source).to_string(),
                    ty_node,
                    ty_text,
                });
            }
            "spread_parameter" => {
                let name = find_child_by_kind(&p, "variable_declarator")
                    .and_then(|d| d.child_by_field_name("name"))
                    .map(|n| node_text(&n, source).to_string());
                let Some(name) = name else { continue };
                let ty_node = named_children(&p)
                    .into_iter()
                    .find(|c| is_type_node(c.kind()));
                // Varargs erase to an array of the element type
                let ty_text = ty_node
                    .as_ref()
                    .map(|t| format!("{}[]", node_text(t, source)))
                    .unwrap_or_default();
                out.push(ParamInfo {
                    node: p,
                    name,
                    ty_node,
                    ty_text,
                });
            }
            _ => {}
        }
    }
    out
}

fn type_parameter_names(declaration: &Node, source: &str) -> Vec<String> {
    let Some(tps) = declaration.child_by_field_name("type_parameters") else {
        return Vec::new();
    };
    // The grammar names type parameters with type_identifier nodes
    named_children(&tps)
        .iter()
        .filter_map(|tp| find_child_by_kind(tp, "type_identifier"))
        .map(|id| node_text(&id, source).to_string())
        .collect()
}

/// Pre-scan: package, import tables, and a [`TypeDescriptor`] for every
/// named type declared in the unit (method-body locals excluded; local and
/// anonymous classes are registered lazily during the walk).
pub fn scan_unit(root: &Node, source: &str) -> UnitScope {
    let mut unit = UnitScope {
        package: DEFAULT_PACKAGE.to_string(),
        ..Default::default()
    };

    for child in named_children(root) {
        match child.kind() {
            "package_declaration" => {
                if let Some(name) = named_children(&child)
                    .into_iter()
                    .find(|n| matches!(n.kind(), "identifier" | "scoped_identifier"))
                {
                    unit.package = node_text(&name, source).to_string();
                }
            }
            "import_declaration" => {
                // Static imports name members, not types
                if find_child_by_kind(&child, "static").is_some() {
                    continue;
                }
                let Some(name) = named_children(&child)
                    .into_iter()
                    .find(|n| matches!(n.kind(), "identifier" | "scoped_identifier"))
                else {
                    continue;
                };
                let path = node_text(&name, source).to_string();
                if find_child_by_kind(&child, "asterisk").is_some() {
                    unit.wildcard_imports.push(path);
                } else if let Some((_, simple)) = path.rsplit_once('.') {
                    unit.single_imports.insert(simple.to_string(), path);
                }
            }
            _ => {}
        }
    }

    for child in named_children(root) {
        if !is_type_declaration(child.kind()) {
            continue;
        }
        let Some(name_node) = child.child_by_field_name("name") else {
            continue;
        };
        let name = node_text(&name_node, source);
        let fqn = if unit.package == DEFAULT_PACKAGE {
            name.to_string()
        } else {
            top_level_type_fqn(&unit.package, name)
        };
        unit.top_level_names.insert(name.to_string(), fqn.clone());
        scan_type(&child, source, &mut unit, fqn, &[]);
    }

    unit
}

/// Build and insert the descriptor for one named type declaration.
///
/// `inherited_params` carries the type parameters of all enclosing types so
/// signature erasure agrees between declaration and call sites.
pub(crate) fn scan_type(
    node: &Node,
    source: &str,
    unit: &mut UnitScope,
    fqn: String,
    inherited_params: &[String],
) {
    let mut descriptor = TypeDescriptor::new(fqn);
    descriptor.type_params = inherited_params.to_vec();
    descriptor
        .type_params
        .extend(type_parameter_names(node, source));

    match node.kind() {
        "class_declaration" => {
            if let Some(superclass) = node.child_by_field_name("superclass") {
                if let Some(ty) = named_children(&superclass).into_iter().next() {
                    let text = strip_generics(node_text(&ty, source));
                    descriptor.superclass = Some(text.trim().to_string());
                }
            }
        }
        "interface_declaration" | "annotation_type_declaration" => {
            descriptor.is_interface = true;
        }
        _ => {}
    }

    for clause in ["super_interfaces", "extends_interfaces"] {
        if let Some(clause_node) = find_child_by_kind(node, clause) {
            if let Some(list) = find_child_by_kind(&clause_node, "type_list") {
                for ty in named_children(&list) {
                    let text = strip_generics(node_text(&ty, source));
                    descriptor.interfaces.push(text.trim().to_string());
                }
            }
        }
    }

    // Record components double as fields and as the canonical constructor
    let component_types: Vec<String> = if node.kind() == "record_declaration" {
        let components = parameter_infos(node, source);
        for c in &components {
            descriptor.fields.push(FieldDescriptor {
                name: c.name.clone(),
                ty: c.ty_text.clone(),
            });
        }
        components.into_iter().map(|c| c.ty_text).collect()
    } else {
        Vec::new()
    };

    let mut declares_ctor = false;
    if let Some(body) = node.child_by_field_name("body") {
        scan_members(&body, source, unit, &mut descriptor, &mut declares_ctor);
    }
    if !descriptor.is_interface && !declares_ctor {
        descriptor.methods.push(MethodDescriptor {
            name: "<init>".to_string(),
            params: component_types,
            ret: None,
            type_params: Vec::new(),
        });
    }

    unit.unit_types.insert(descriptor.fqn.clone(), descriptor);
}

fn scan_members(
    body: &Node,
    source: &str,
    unit: &mut UnitScope,
    descriptor: &mut TypeDescriptor,
    declares_ctor: &mut bool,
) {
    for member in named_children(body) {
        match member.kind() {
            "field_declaration" | "constant_declaration" => {
                let Some(ty) = member.child_by_field_name("type") else {
                    continue;
                };
                let ty_text = node_text(&ty, source);
                for decl in named_children(&member)
                    .into_iter()
                    .filter(|n| n.kind() == "variable_declarator")
                {
                    let Some(name_node) = decl.child_by_field_name("name") else {
                        continue;
                    };
                    let dims = decl
                        .child_by_field_name("dimensions")
                        .map(|d| node_text(&d, source).split_whitespace().collect::<String>())
                        .unwrap_or_default();
                    descriptor.fields.push(FieldDescriptor {
                        name: node_text(&name_node, source).to_string(),
                        ty: format!("{}{}", ty_text, dims),
                    });
                }
            }
            "method_declaration" => {
                let Some(name_node) = member.child_by_field_name("name") else {
                    continue;
                };
                let params = parameter_infos(&member, source)
                    .into_iter()
                    .map(|p| p.ty_text)
                    .collect();
                let ret = member
                    .child_by_field_name("type")
                    .map(|t| node_text(&t, source).to_string());
                descriptor.methods.push(MethodDescriptor {
                    name: node_text(&name_node, source).to_string(),
                    params,
                    ret,
                    type_params: type_parameter_names(&member, source),
                });
            }
            "constructor_declaration" => {
                *declares_ctor = true;
                let params = parameter_infos(&member, source)
                    .into_iter()
                    .map(|p| p.ty_text)
                    .collect();
                descriptor.methods.push(MethodDescriptor {
                    name: "<init>".to_string(),
                    params,
                    ret: None,
                    type_params: type_parameter_names(&member, source),
                });
            }
            // The canonical record constructor is synthesized from the
            // components; a compact constructor only customizes its body
            "compact_constructor_declaration" => {}
            "enum_constant" => {
                if let Some(name_node) = member.child_by_field_name("name") {
                    descriptor.fields.push(FieldDescriptor {
                        name: node_text(&name_node, source).to_string(),
                        ty: descriptor.fqn.clone(),
                    });
                }
            }
            "enum_body_declarations" => {
                scan_members(&member, source, unit, descriptor, declares_ctor);
            }
            "annotation_type_element_declaration" => {
                let Some(name_node) = member.child_by_field_name("name") else {
                    continue;
                };
                let ret = member
                    .child_by_field_name("type")
                    .map(|t| node_text(&t, source).to_string());
                descriptor.methods.push(MethodDescriptor {
                    name: node_text(&name_node, source).to_string(),
                    params: Vec::new(),
                    ret,
                    type_params: Vec::new(),
                });
            }
            kind if is_type_declaration(kind) => {
                if let Some(name_node) = member.child_by_field_name("name") {
                    let name = node_text(&name_node, source);
                    let nested = nested_type_fqn(&descriptor.fqn, name);
                    let inherited = descriptor.type_params.clone();
                    scan_type(&member, source, unit, nested, &inherited);
                }
            }
            _ => {}
        }
    }
}

/// Walk one parsed unit and return its complete fact stream.
pub fn walk_unit(unit: &ParsedUnit, source: &str, index: &dyn TypeIndex) -> Vec<Fact> {
    let root = unit.root();
    let unit_scope = scan_unit(&root, source);
    let package = unit_scope.package.clone();
    tracing::debug!(
        package = %package,
        types = unit_scope.unit_types.len(),
        "walking compilation unit"
    );

    let mut walker = Walker {
        source,
        package,
        resolver: Resolver::new(index, unit_scope),
        registry: EntityRegistry::new(),
        relations: RelationCollector::new(),
        scopes: ScopeStack::new(),
        facts: Vec::new(),
    };
    for child in named_children(&root) {
        if is_type_declaration(child.kind()) {
            walker.walk_type_declaration(&child);
        }
    }
    walker.facts
}

struct Walker<'a> {
    source: &'a str,
    package: String,
    resolver: Resolver<'a>,
    registry: EntityRegistry,
    relations: RelationCollector,
    scopes: ScopeStack,
    facts: Vec<Fact>,
}

impl<'a> Walker<'a> {
    fn text(&self, node: &Node) -> &'a str {
        &self.source[node.byte_range()]
    }

    /// FQN the current syntactic position attributes facts to.
    fn source_fqn(&self) -> String {
        self.scopes
            .innermost_entity()
            .unwrap_or(&self.package)
            .to_string()
    }

    fn relate(
        &mut self,
        kind: RelationKind,
        source: &str,
        target: Reference,
        context: Option<String>,
    ) {
        if self
            .relations
            .add(kind, source, target.clone(), context.clone())
        {
            self.facts.push(Fact::Relation(Relation {
                kind,
                source: source.to_string(),
                target,
                context,
            }));
        }
    }

    fn register_node(
        &mut self,
        node: &Node,
        fqn: String,
        kind: EntityKind,
        modifiers: Vec<Modifier>,
        enclosing: Option<String>,
    ) {
        let outcome = self
            .registry
            .register(node.id(), fqn, kind, modifiers, enclosing);
        if outcome.newly_registered {
            if let Some(entity) = self.registry.entity(&outcome.fqn) {
                self.facts.push(Fact::Entity(entity.clone()));
            }
        }
    }

    fn relate_inside(&mut self, fqn: &str, enclosing: &Option<String>) {
        let target = enclosing.clone().unwrap_or_else(|| self.package.clone());
        self.relate(RelationKind::Inside, fqn, Reference::Resolved(target), None);
    }

    /// Split a declaration's `modifiers` child into keywords and annotations.
    fn modifiers_of<'t>(&self, node: &Node<'t>) -> (Vec<Modifier>, Vec<Node<'t>>) {
        let mut modifiers = Vec::new();
        let mut annotations = Vec::new();
        if let Some(mods) = find_child_by_kind(node, "modifiers") {
            for i in 0..mods.child_count() {
                let Some(child) = mods.child(i) else { continue };
                match child.kind() {
                    "marker_annotation" | "annotation" => annotations.push(child),
                    kind => {
                        if let Some(modifier) = Modifier::from_keyword(kind) {
                            modifiers.push(modifier);
                        }
                    }
                }
            }
        }
        (modifiers, annotations)
    }

    // ---- type declarations ----

    fn walk_type_declaration(&mut self, node: &Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node).to_string();
        let kind = match node.kind() {
            "interface_declaration" => EntityKind::Interface,
            "enum_declaration" => EntityKind::Enum,
            "annotation_type_declaration" => EntityKind::AnnotationType,
            _ => EntityKind::Class,
        };

        let enclosing = self.scopes.innermost_entity().map(str::to_string);
        let enclosing_type = self.scopes.enclosing_type().map(str::to_string);
        let in_callable = self.scopes.enclosing_callable().is_some();

        let fqn = match (&enclosing_type, in_callable) {
            (Some(outer), true) => self.registry.next_local_class_fqn(outer, &name),
            (Some(outer), false) => nested_type_fqn(outer, &name),
            _ => {
                if self.package == DEFAULT_PACKAGE {
                    name.clone()
                } else {
                    top_level_type_fqn(&self.package, &name)
                }
            }
        };

        // Local classes were invisible to the pre-scan
        if !self.resolver.unit.unit_types.contains_key(&fqn) {
            let inherited: Vec<String> = self
                .scopes
                .type_params_in_scope()
                .iter()
                .map(|s| s.to_string())
                .collect();
            scan_type(node, self.source, &mut self.resolver.unit, fqn.clone(), &inherited);
        }

        let (modifiers, annotations) = self.modifiers_of(node);
        self.register_node(node, fqn.clone(), kind, modifiers, enclosing.clone());
        self.relate_inside(&fqn, &enclosing);
        for anno in &annotations {
            self.handle_annotation(anno, &fqn);
        }

        if node.kind() == "class_declaration" {
            if let Some(superclass) = node.child_by_field_name("superclass") {
                if let Some(ty) = named_children(&superclass).into_iter().next() {
                    let reference = self.resolve_type_node(&ty);
                    let context = self.text(&ty).to_string();
                    self.relate(RelationKind::Extends, &fqn, reference, Some(context));
                    self.emit_type_use(&ty, &fqn);
                }
            }
        }
        for (clause, relation) in [
            ("super_interfaces", RelationKind::Implements),
            ("extends_interfaces", RelationKind::Extends),
        ] {
            let Some(clause_node) = find_child_by_kind(node, clause) else {
                continue;
            };
            let Some(list) = find_child_by_kind(&clause_node, "type_list") else {
                continue;
            };
            for ty in named_children(&list) {
                let reference = self.resolve_type_node(&ty);
                let context = self.text(&ty).to_string();
                self.relate(relation, &fqn, reference, Some(context));
                self.emit_type_use(&ty, &fqn);
            }
        }

        let type_params = type_parameter_names(node, self.source);
        self.scopes.push_type(fqn.clone(), type_params);

        if let Some(tps) = node.child_by_field_name("type_parameters") {
            for tp in named_children(&tps) {
                if let Some(bound) = find_child_by_kind(&tp, "type_bound") {
                    for ty in named_children(&bound) {
                        self.emit_type_use(&ty, &fqn);
                    }
                }
            }
        }

        if node.kind() == "record_declaration" {
            self.walk_record_components(node, &fqn);
        }

        let mut declares_ctor = false;
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_type_body(&body, &fqn, &mut declares_ctor);
        }
        if matches!(kind, EntityKind::Class | EntityKind::Enum) && !declares_ctor {
            self.synthesize_default_constructor(node, &fqn);
        }

        self.scopes.pop();
    }

    fn walk_record_components(&mut self, node: &Node, owner: &str) {
        for component in parameter_infos(node, self.source) {
            let fqn = member_fqn(owner, &component.name);
            self.register_node(
                &component.node,
                fqn.clone(),
                EntityKind::Field,
                Vec::new(),
                Some(owner.to_string()),
            );
            self.relate_inside(&fqn, &Some(owner.to_string()));
            if let Some(ty) = &component.ty_node {
                self.emit_type_use(ty, &fqn);
            }
        }
    }

    /// A class (or record) without a declared constructor still constructs:
    /// emit the implicit no-argument constructor and its super call. Enum
    /// default constructors exist too, but chain to no visible super.
    fn synthesize_default_constructor(&mut self, node: &Node, owner: &str) {
        let params: Vec<String> = if node.kind() == "record_declaration" {
            parameter_infos(node, self.source)
                .iter()
                .map(|c| self.resolver.erase_param_type(&c.ty_text, &[], &self.scopes))
                .collect()
        } else {
            Vec::new()
        };
        let fqn = callable_fqn(owner, "<init>", &params);
        let outcome = self.registry.register_synthetic(
            fqn.clone(),
            EntityKind::Constructor,
            Vec::new(),
            Some(owner.to_string()),
        );
        if outcome.newly_registered {
            if let Some(entity) = self.registry.entity(&fqn) {
                self.facts.push(Fact::Entity(entity.clone()));
            }
        }
        self.relate_inside(&fqn, &Some(owner.to_string()));

        if node.kind() != "enum_declaration" {
            let target = self.super_constructor_of(owner, &[]);
            self.relate(RelationKind::Calls, &fqn, target, None);
        }
    }

    /// Resolved FQN of a type's direct superclass; the implicit
    /// `java.lang.Object` counts only when the index knows it.
    fn resolved_superclass(&self, type_fqn: &str) -> Option<String> {
        let superclass = self.resolver.lookup(type_fqn)?.superclass.clone();
        match superclass {
            Some(text) => match self.resolver.resolve_type_name(&text, &self.scopes) {
                Reference::Resolved(fqn) => Some(fqn),
                Reference::Unresolved => None,
            },
            None => self
                .resolver
                .lookup("java.lang.Object")
                .map(|d| d.fqn.clone()),
        }
    }

    fn super_constructor_of(&self, type_fqn: &str, arg_types: &[Option<String>]) -> Reference {
        match self.resolved_superclass(type_fqn) {
            Some(superclass) => {
                self.resolver
                    .resolve_method(&superclass, "<init>", arg_types, &self.scopes)
                    .0
            }
            None => Reference::Unresolved,
        }
    }

    // ---- members ----

    fn walk_type_body(&mut self, body: &Node, owner: &str, declares_ctor: &mut bool) {
        for member in named_children(body) {
            match member.kind() {
                "field_declaration" | "constant_declaration" => self.walk_field(&member, owner),
                "method_declaration" => self.walk_method(&member, owner),
                "constructor_declaration" => {
                    *declares_ctor = true;
                    self.walk_constructor(&member, owner);
                }
                "compact_constructor_declaration" => {
                    *declares_ctor = true;
                    self.walk_compact_constructor(&member, owner);
                }
                "static_initializer" => self.walk_initializer(&member, owner, true),
                "block" => self.walk_initializer(&member, owner, false),
                "enum_constant" => self.walk_enum_constant(&member, owner),
                "enum_body_declarations" => self.walk_type_body(&member, owner, declares_ctor),
                "annotation_type_element_declaration" => {
                    self.walk_annotation_element(&member, owner)
                }
                kind if is_type_declaration(kind) => self.walk_type_declaration(&member),
                _ => {}
            }
        }
    }

    fn walk_field(&mut self, node: &Node, owner: &str) {
        let Some(ty) = node.child_by_field_name("type") else {
            return;
        };
        let (modifiers, annotations) = self.modifiers_of(node);
        for decl in named_children(node)
            .into_iter()
            .filter(|n| n.kind() == "variable_declarator")
        {
            let Some(name_node) = decl.child_by_field_name("name") else {
                continue;
            };
            let fname = self.text(&name_node);
            let fqn = member_fqn(owner, fname);
            self.register_node(
                &decl,
                fqn.clone(),
                EntityKind::Field,
                modifiers.clone(),
                Some(owner.to_string()),
            );
            self.relate_inside(&fqn, &Some(owner.to_string()));
            for anno in &annotations {
                self.handle_annotation(anno, &fqn);
            }
            self.emit_type_use(&ty, &fqn);
            if let Some(value) = decl.child_by_field_name("value") {
                // Initializer expressions attribute to the field itself
                self.scopes.push_callable(fqn.clone(), Vec::new());
                self.walk_node(&value);
                self.scopes.pop();
            }
        }
    }

    fn walk_method(&mut self, node: &Node, owner: &str) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node).to_string();
        let (modifiers, annotations) = self.modifiers_of(node);
        let method_type_params = type_parameter_names(node, self.source);
        let params = parameter_infos(node, self.source);
        let erased: Vec<String> = params
            .iter()
            .map(|p| {
                self.resolver
                    .erase_param_type(&p.ty_text, &method_type_params, &self.scopes)
            })
            .collect();
        let fqn = callable_fqn(owner, &name, &erased);

        self.register_node(
            node,
            fqn.clone(),
            EntityKind::Method,
            modifiers,
            Some(owner.to_string()),
        );
        self.relate_inside(&fqn, &Some(owner.to_string()));
        for anno in &annotations {
            self.handle_annotation(anno, &fqn);
        }

        if let Some(ret) = node.child_by_field_name("type") {
            let reference = self.resolve_type_node(&ret);
            let context = self.text(&ret).to_string();
            self.relate(RelationKind::Returns, &fqn, reference, Some(context));
            self.emit_type_use(&ret, &fqn);
        }

        self.scopes.push_callable(fqn.clone(), method_type_params);
        self.declare_parameters(&params, &fqn);
        self.handle_throws(node, &fqn);
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_node(&body);
        }
        self.scopes.pop();
    }

    fn walk_constructor(&mut self, node: &Node, owner: &str) {
        let (modifiers, annotations) = self.modifiers_of(node);
        let ctor_type_params = type_parameter_names(node, self.source);
        let params = parameter_infos(node, self.source);
        let erased: Vec<String> = params
            .iter()
            .map(|p| {
                self.resolver
                    .erase_param_type(&p.ty_text, &ctor_type_params, &self.scopes)
            })
            .collect();
        let fqn = callable_fqn(owner, "<init>", &erased);

        self.register_node(
            node,
            fqn.clone(),
            EntityKind::Constructor,
            modifiers,
            Some(owner.to_string()),
        );
        self.relate_inside(&fqn, &Some(owner.to_string()));
        for anno in &annotations {
            self.handle_annotation(anno, &fqn);
        }

        self.scopes.push_callable(fqn.clone(), ctor_type_params);
        self.declare_parameters(&params, &fqn);
        self.handle_throws(node, &fqn);

        let body = node.child_by_field_name("body");
        let has_explicit = body
            .and_then(|b| named_children(&b).into_iter().next())
            .map(|first| first.kind() == "explicit_constructor_invocation")
            .unwrap_or(false);
        if !has_explicit && !enclosing_type_is_enum(node) {
            // Constructor bodies without this()/super() chain implicitly;
            // enum constructors never chain upward
            let target = self.super_constructor_of(owner, &[]);
            self.relate(RelationKind::Calls, &fqn, target, None);
        }
        if let Some(body) = body {
            for child in named_children(&body) {
                if child.kind() == "explicit_constructor_invocation" {
                    self.walk_explicit_invocation(&child, owner, &fqn);
                } else {
                    self.walk_node(&child);
                }
            }
        }
        self.scopes.pop();
    }

    fn walk_explicit_invocation(&mut self, node: &Node, owner: &str, ctor_fqn: &str) {
        let keyword = node
            .child_by_field_name("constructor")
            .or_else(|| find_child_by_kind(node, "this"))
            .or_else(|| find_child_by_kind(node, "super"));
        let keyword_text = keyword.map(|k| self.text(&k).to_string());
        let is_this = keyword_text.as_deref() == Some("this");

        let args = node.child_by_field_name("arguments");
        let arg_types = self.argument_types(args);
        let target = if is_this {
            self.resolver
                .resolve_method(owner, "<init>", &arg_types, &self.scopes)
                .0
        } else {
            self.super_constructor_of(owner, &arg_types)
        };
        self.relate(RelationKind::Calls, ctor_fqn, target, keyword_text);
        self.walk_arguments(args);
    }

    fn walk_compact_constructor(&mut self, node: &Node, owner: &str) {
        let (modifiers, annotations) = self.modifiers_of(node);
        // The canonical signature comes from the record components
        let raw: Vec<String> = self
            .resolver
            .lookup(owner)
            .and_then(|d| d.methods_named("<init>").next().cloned())
            .map(|m| m.params)
            .unwrap_or_default();
        let erased: Vec<String> = raw
            .iter()
            .map(|p| self.resolver.erase_param_type(p, &[], &self.scopes))
            .collect();
        let fqn = callable_fqn(owner, "<init>", &erased);

        self.register_node(
            node,
            fqn.clone(),
            EntityKind::Constructor,
            modifiers,
            Some(owner.to_string()),
        );
        self.relate_inside(&fqn, &Some(owner.to_string()));
        for anno in &annotations {
            self.handle_annotation(anno, &fqn);
        }

        self.scopes.push_callable(fqn.clone(), Vec::new());
        let target = self.super_constructor_of(owner, &[]);
        self.relate(RelationKind::Calls, &fqn, target, None);
        if let Some(body) = node.child_by_field_name("body") {
            for child in named_children(&body) {
                self.walk_node(&child);
            }
        }
        self.scopes.pop();
    }

    fn walk_initializer(&mut self, node: &Node, owner: &str, is_static: bool) {
        let fqn = self.registry.next_initializer_fqn(owner, is_static);
        let modifiers = if is_static {
            vec![Modifier::Static]
        } else {
            Vec::new()
        };
        self.register_node(
            node,
            fqn.clone(),
            EntityKind::Initializer,
            modifiers,
            Some(owner.to_string()),
        );
        self.relate_inside(&fqn, &Some(owner.to_string()));

        self.scopes.push_callable(fqn, Vec::new());
        let block = if node.kind() == "static_initializer" {
            find_child_by_kind(node, "block")
        } else {
            Some(*node)
        };
        if let Some(block) = block {
            for child in named_children(&block) {
                self.walk_node(&child);
            }
        }
        self.scopes.pop();
    }

    fn walk_enum_constant(&mut self, node: &Node, owner: &str) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node).to_string();
        let fqn = member_fqn(owner, &name);
        let (modifiers, annotations) = self.modifiers_of(node);
        self.register_node(
            node,
            fqn.clone(),
            EntityKind::EnumConstant,
            modifiers,
            Some(owner.to_string()),
        );
        self.relate_inside(&fqn, &Some(owner.to_string()));
        for anno in &annotations {
            self.handle_annotation(anno, &fqn);
        }

        // Each constant invokes an enum constructor
        let args = node.child_by_field_name("arguments");
        let arg_types = self.argument_types(args);
        let target = self
            .resolver
            .resolve_method(owner, "<init>", &arg_types, &self.scopes)
            .0;
        self.relate(RelationKind::Calls, &fqn, target, Some(name.clone()));
        if args.is_some() {
            self.scopes.push_callable(fqn.clone(), Vec::new());
            self.walk_arguments(args);
            self.scopes.pop();
        }

        if let Some(body) = node.child_by_field_name("body") {
            let anon = self.registry.next_anonymous_fqn(owner);
            self.register_runtime_type(&body, &anon, Some(owner.to_string()), false);
            self.register_node(
                &body,
                anon.clone(),
                EntityKind::Class,
                Vec::new(),
                Some(fqn.clone()),
            );
            self.relate_inside(&anon, &Some(fqn.clone()));
            self.relate(
                RelationKind::Extends,
                &anon,
                Reference::Resolved(owner.to_string()),
                None,
            );
            self.scopes.push_type(anon.clone(), Vec::new());
            let mut declares_ctor = false;
            self.walk_type_body(&body, &anon, &mut declares_ctor);
            self.scopes.pop();
        }
    }

    fn walk_annotation_element(&mut self, node: &Node, owner: &str) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node);
        let fqn = callable_fqn(owner, name, &[]);
        let (modifiers, annotations) = self.modifiers_of(node);
        self.register_node(
            node,
            fqn.clone(),
            EntityKind::Method,
            modifiers,
            Some(owner.to_string()),
        );
        self.relate_inside(&fqn, &Some(owner.to_string()));
        for anno in &annotations {
            self.handle_annotation(anno, &fqn);
        }
        if let Some(ty) = node.child_by_field_name("type") {
            let reference = self.resolve_type_node(&ty);
            let context = self.text(&ty).to_string();
            self.relate(RelationKind::Returns, &fqn, reference, Some(context));
            self.emit_type_use(&ty, &fqn);
        }
        if let Some(value) = node.child_by_field_name("value") {
            self.scopes.push_callable(fqn.clone(), Vec::new());
            self.walk_node(&value);
            self.scopes.pop();
        }
    }

    fn declare_parameters(&mut self, params: &[ParamInfo], callable: &str) {
        for (position, param) in params.iter().enumerate() {
            let pfqn = self.registry.next_local_fqn(callable, &param.name);
            let (pmods, pannos) = self.modifiers_of(&param.node);
            self.register_node(
                &param.node,
                pfqn.clone(),
                EntityKind::Parameter,
                pmods,
                Some(callable.to_string()),
            );
            self.relate_inside(&pfqn, &Some(callable.to_string()));
            for anno in &pannos {
                self.handle_annotation(anno, &pfqn);
            }
            self.relate(
                RelationKind::Param,
                callable,
                Reference::Resolved(pfqn.clone()),
                Some(position.to_string()),
            );
            if let Some(ty) = &param.ty_node {
                self.emit_type_use(ty, callable);
            }
            self.scopes.declare_local(
                param.name.clone(),
                LocalBinding {
                    fqn: pfqn,
                    ty: Some(param.ty_text.clone()),
                },
            );
        }
    }

    fn handle_throws(&mut self, node: &Node, callable: &str) {
        let Some(throws) = find_child_by_kind(node, "throws") else {
            return;
        };
        for ty in named_children(&throws) {
            let reference = self.resolve_type_node(&ty);
            let context = self.text(&ty).to_string();
            self.relate(RelationKind::Throws, callable, reference, Some(context));
            self.emit_type_use(&ty, callable);
        }
    }

    fn handle_annotation(&mut self, node: &Node, source_fqn: &str) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name_text = self.text(&name_node).to_string();
        let reference = self.resolver.resolve_type_name(&name_text, &self.scopes);
        self.relate(
            RelationKind::AnnotatedBy,
            source_fqn,
            reference,
            Some(name_text.clone()),
        );
        self.emit_dotted_type_use(&name_text, source_fqn);
        if let Some(args) = node.child_by_field_name("arguments") {
            // Argument expressions attribute to the annotated entity
            self.scopes.push_callable(source_fqn.to_string(), Vec::new());
            for arg in named_children(&args) {
                self.walk_node(&arg);
            }
            self.scopes.pop();
        }
    }

    /// Insert a descriptor for a type only discovered during the walk
    /// (anonymous classes, enum constant bodies), so members resolve inside
    /// its body.
    fn register_runtime_type(
        &mut self,
        body: &Node,
        fqn: &str,
        supertype: Option<String>,
        implements: bool,
    ) {
        if self.resolver.unit.unit_types.contains_key(fqn) {
            return;
        }
        let mut descriptor = TypeDescriptor::new(fqn.to_string());
        if let Some(supertype) = supertype {
            if implements {
                descriptor.interfaces.push(supertype);
            } else {
                descriptor.superclass = Some(supertype);
            }
        }
        let mut declares_ctor = false;
        scan_members(
            body,
            self.source,
            &mut self.resolver.unit,
            &mut descriptor,
            &mut declares_ctor,
        );
        self.resolver
            .unit
            .unit_types
            .insert(fqn.to_string(), descriptor);
    }

    // ---- statements ----

    fn walk_node(&mut self, node: &Node) {
        match node.kind() {
            "local_variable_declaration" => self.walk_local_declaration(node),
            "block" => {
                self.scopes.push_block();
                for child in named_children(node) {
                    self.walk_node(&child);
                }
                self.scopes.pop();
            }
            "for_statement" | "try_with_resources_statement" => {
                self.scopes.push_block();
                for child in named_children(node) {
                    self.walk_node(&child);
                }
                self.scopes.pop();
            }
            "enhanced_for_statement" => self.walk_enhanced_for(node),
            "catch_clause" => self.walk_catch(node),
            "resource" => self.walk_resource(node),
            "labeled_statement" => {
                for child in named_children(node) {
                    if child.kind() != "identifier" {
                        self.walk_node(&child);
                    }
                }
            }
            "break_statement" | "continue_statement" => {}
            "element_value_pair" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.walk_node(&value);
                }
            }
            kind if is_type_declaration(kind) => self.walk_type_declaration(node),
            kind if EXPRESSION_KINDS.contains(&kind) => self.walk_expr(node, false),
            _ => {
                for child in named_children(node) {
                    self.walk_node(&child);
                }
            }
        }
    }

    fn walk_local_declaration(&mut self, node: &Node) {
        let ty = node.child_by_field_name("type");
        let ty_text = ty.map(|t| self.text(&t).to_string());
        let inferred = ty_text.as_deref() == Some("var");
        let callable = self.source_fqn();
        let (modifiers, _) = self.modifiers_of(node);

        for decl in named_children(node)
            .into_iter()
            .filter(|n| n.kind() == "variable_declarator")
        {
            let Some(name_node) = decl.child_by_field_name("name") else {
                continue;
            };
            let name = self.text(&name_node).to_string();
            let dims = decl
                .child_by_field_name("dimensions")
                .map(|d| self.text(&d).split_whitespace().collect::<String>())
                .unwrap_or_default();
            let fqn = self.registry.next_local_fqn(&callable, &name);
            self.register_node(
                &decl,
                fqn.clone(),
                EntityKind::LocalVariable,
                modifiers.clone(),
                Some(callable.clone()),
            );
            self.relate_inside(&fqn, &Some(callable.clone()));
            if !inferred {
                if let Some(ty) = &ty {
                    self.emit_type_use(ty, &callable);
                }
            }

            let value = decl.child_by_field_name("value");
            if let Some(value) = &value {
                // The initializer sees the outer binding, not the new one
                self.walk_node(value);
            }
            let binding_ty = if inferred {
                value.and_then(|v| self.static_type_of(&v))
            } else {
                ty_text.clone().map(|t| format!("{}{}", t, dims))
            };
            self.scopes.declare_local(
                name,
                LocalBinding {
                    fqn,
                    ty: binding_ty,
                },
            );
        }
    }

    fn walk_enhanced_for(&mut self, node: &Node) {
        self.scopes.push_block();
        if let Some(value) = node.child_by_field_name("value") {
            self.walk_expr(&value, false);
        }
        if let Some(name_node) = node.child_by_field_name("name") {
            let name = self.text(&name_node).to_string();
            let callable = self.source_fqn();
            let fqn = self.registry.next_local_fqn(&callable, &name);
            self.register_node(
                &name_node,
                fqn.clone(),
                EntityKind::LocalVariable,
                Vec::new(),
                Some(callable.clone()),
            );
            self.relate_inside(&fqn, &Some(callable.clone()));
            let ty = node.child_by_field_name("type");
            let mut binding_ty = None;
            if let Some(ty) = &ty {
                let text = self.text(ty);
                if text != "var" {
                    self.emit_type_use(ty, &callable);
                    binding_ty = Some(text.to_string());
                }
            }
            self.scopes.declare_local(
                name,
                LocalBinding {
                    fqn,
                    ty: binding_ty,
                },
            );
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_node(&body);
        }
        self.scopes.pop();
    }

    fn walk_catch(&mut self, node: &Node) {
        self.scopes.push_block();
        if let Some(param) = find_child_by_kind(node, "catch_formal_parameter") {
            let name_node = param
                .child_by_field_name("name")
                .or_else(|| find_child_by_kind(&param, "identifier"));
            if let Some(name_node) = name_node {
                let name = self.text(&name_node).to_string();
                let callable = self.source_fqn();
                let fqn = self.registry.next_local_fqn(&callable, &name);
                self.register_node(
                    &name_node,
                    fqn.clone(),
                    EntityKind::Parameter,
                    Vec::new(),
                    Some(callable.clone()),
                );
                self.relate_inside(&fqn, &Some(callable.clone()));
                let mut binding_ty = None;
                if let Some(catch_ty) = find_child_by_kind(&param, "catch_type") {
                    let alternatives = named_children(&catch_ty);
                    if alternatives.len() == 1 {
                        binding_ty = Some(self.text(&alternatives[0]).to_string());
                    }
                    for ty in alternatives {
                        self.emit_type_use(&ty, &callable);
                    }
                }
                self.scopes.declare_local(
                    name,
                    LocalBinding {
                        fqn,
                        ty: binding_ty,
                    },
                );
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_node(&body);
        }
        self.scopes.pop();
    }

    fn walk_resource(&mut self, node: &Node) {
        if let Some(name_node) = node.child_by_field_name("name") {
            let name = self.text(&name_node).to_string();
            let callable = self.source_fqn();
            let fqn = self.registry.next_local_fqn(&callable, &name);
            let (modifiers, _) = self.modifiers_of(node);
            self.register_node(
                &name_node,
                fqn.clone(),
                EntityKind::LocalVariable,
                modifiers,
                Some(callable.clone()),
            );
            self.relate_inside(&fqn, &Some(callable.clone()));
            let ty = node.child_by_field_name("type");
            let mut binding_ty = None;
            if let Some(ty) = &ty {
                let text = self.text(ty);
                if text != "var" {
                    self.emit_type_use(ty, &callable);
                    binding_ty = Some(text.to_string());
                }
            }
            if let Some(value) = node.child_by_field_name("value") {
                self.walk_expr(&value, false);
            }
            self.scopes.declare_local(
                name,
                LocalBinding {
                    fqn,
                    ty: binding_ty,
                },
            );
        } else {
            // Existing variable used as resource
            for child in named_children(node) {
                self.walk_node(&child);
            }
        }
    }

    // ---- expressions ----

    fn walk_expr(&mut self, node: &Node, write: bool) {
        match node.kind() {
            "identifier" => self.identifier_access(node, write),
            "this" | "super" => {}
            "parenthesized_expression" => {
                if let Some(inner) = named_children(node).into_iter().next() {
                    self.walk_expr(&inner, write);
                }
            }
            "assignment_expression" => {
                let compound = node
                    .child(1)
                    .map(|op| op.kind() != "=")
                    .unwrap_or(false);
                if let Some(left) = node.child_by_field_name("left") {
                    self.walk_expr(&left, true);
                    if compound {
                        self.walk_expr(&left, false);
                    }
                }
                if let Some(right) = node.child_by_field_name("right") {
                    self.walk_expr(&right, false);
                }
            }
            "update_expression" => {
                if let Some(operand) = named_children(node).into_iter().next() {
                    self.walk_expr(&operand, true);
                    self.walk_expr(&operand, false);
                }
            }
            "unary_expression" => {
                if let Some(operand) = node.child_by_field_name("operand") {
                    self.walk_expr(&operand, false);
                }
            }
            "binary_expression" => {
                for field in ["left", "right"] {
                    if let Some(side) = node.child_by_field_name(field) {
                        self.walk_expr(&side, false);
                    }
                }
            }
            "ternary_expression" => {
                for field in ["condition", "consequence", "alternative"] {
                    if let Some(part) = node.child_by_field_name(field) {
                        self.walk_expr(&part, false);
                    }
                }
            }
            "cast_expression" => {
                let src = self.source_fqn();
                if let Some(ty) = node.child_by_field_name("type") {
                    self.emit_type_use(&ty, &src);
                }
                if let Some(value) = node.child_by_field_name("value") {
                    self.walk_expr(&value, false);
                }
            }
            "instanceof_expression" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.walk_expr(&left, false);
                }
                let src = self.source_fqn();
                let right = node.child_by_field_name("right");
                if let Some(right) = &right {
                    self.emit_type_use(right, &src);
                }
                // Pattern binding introduces a local
                if let Some(name_node) = node.child_by_field_name("name") {
                    let name = self.text(&name_node).to_string();
                    let fqn = self.registry.next_local_fqn(&src, &name);
                    self.register_node(
                        &name_node,
                        fqn.clone(),
                        EntityKind::LocalVariable,
                        Vec::new(),
                        Some(src.clone()),
                    );
                    self.relate_inside(&fqn, &Some(src.clone()));
                    let binding_ty = right.map(|r| self.text(&r).to_string());
                    self.scopes.declare_local(
                        name,
                        LocalBinding {
                            fqn,
                            ty: binding_ty,
                        },
                    );
                }
            }
            "array_access" => {
                if let Some(array) = node.child_by_field_name("array") {
                    self.walk_expr(&array, write);
                }
                if let Some(index) = node.child_by_field_name("index") {
                    self.walk_expr(&index, false);
                }
            }
            "class_literal" => {
                let src = self.source_fqn();
                if let Some(ty) = named_children(node).into_iter().next() {
                    self.emit_type_use(&ty, &src);
                }
            }
            "array_creation_expression" => {
                let src = self.source_fqn();
                let ty = node.child_by_field_name("type");
                if let Some(ty) = &ty {
                    self.emit_type_use(ty, &src);
                }
                for child in named_children(node) {
                    if ty.map(|t| t.id()) == Some(child.id()) {
                        continue;
                    }
                    self.walk_node(&child);
                }
            }
            "field_access" => self.field_access_expr(node, write),
            "method_invocation" => self.method_invocation(node),
            "object_creation_expression" => self.object_creation(node),
            "lambda_expression" => self.walk_lambda(node),
            "method_reference" => self.method_reference(node),
            _ => {
                for child in named_children(node) {
                    self.walk_node(&child);
                }
            }
        }
    }

    fn identifier_access(&mut self, node: &Node, write: bool) {
        let name = self.text(node).to_string();
        let src = self.source_fqn();
        let kind = if write {
            RelationKind::Writes
        } else {
            RelationKind::Reads
        };
        let local = self.scopes.lookup_local(&name).map(|b| b.fqn.clone());
        if let Some(fqn) = local {
            self.relate(kind, &src, Reference::Resolved(fqn), Some(name));
            return;
        }
        let field = self.resolver.resolve_field_in_scope(&name, &self.scopes);
        if let Some((owner, _)) = field {
            let target = member_fqn(&owner, &name);
            self.relate(kind, &src, Reference::Resolved(target), Some(name));
            return;
        }
        self.relate(kind, &src, Reference::Unresolved, Some(name));
    }

    fn field_access_expr(&mut self, node: &Node, write: bool) {
        if let Some(segments) = dotted_segments(node, self.source) {
            self.resolve_dotted_value(&segments, write);
            return;
        }
        let Some(field) = node.child_by_field_name("field") else {
            return;
        };
        let fname = self.text(&field).to_string();
        let object = node.child_by_field_name("object");
        if fname == "this" || fname == "super" {
            // Qualified this/super: no member access of its own
            return;
        }
        let Some(object) = object else { return };
        self.walk_expr(&object, false);
        let src = self.source_fqn();
        let kind = if write {
            RelationKind::Writes
        } else {
            RelationKind::Reads
        };
        let target = self
            .static_type_of(&object)
            .and_then(|t| self.resolver.resolve_field(&t, &fname))
            .map(|(owner, _)| member_fqn(&owner, &fname));
        self.relate(kind, &src, target.into(), Some(fname));
    }

    /// Emit facts for a pure dotted access chain in value position: the
    /// prefix resolves like a receiver, the final segment is a field access.
    fn resolve_dotted_value(&mut self, segments: &[String], write: bool) {
        if segments.len() < 2 {
            return;
        }
        let prefix = self.resolve_dotted_receiver(&segments[..segments.len() - 1]);
        let last = &segments[segments.len() - 1];
        let src = self.source_fqn();
        let kind = if write {
            RelationKind::Writes
        } else {
            RelationKind::Reads
        };
        let target = match prefix {
            ChainResult::Type(t) | ChainResult::Value(Some(t)) => self
                .resolver
                .resolve_field(&t, last)
                .map(|(owner, _)| member_fqn(&owner, last)),
            _ => None,
        };
        self.relate(kind, &src, target.into(), Some(last.clone()));
    }

    /// Emit facts for a dotted chain used as a receiver and report what it
    /// denotes. Locals and fields start an instance chain (READS per
    /// segment); otherwise the shortest prefix naming a type anchors a
    /// static chain (USES per resolvable segment, the remainder re-entering
    /// value position as fields).
    fn resolve_dotted_receiver(&mut self, segments: &[String]) -> ChainResult {
        if segments.is_empty() {
            return ChainResult::Unknown;
        }
        let src = self.source_fqn();
        let first = &segments[0];
        let mut idx = 1;

        let local = self
            .scopes
            .lookup_local(first)
            .map(|b| (b.fqn.clone(), b.ty.clone()));
        let mut state = if let Some((fqn, ty)) = local {
            self.relate(
                RelationKind::Reads,
                &src,
                Reference::Resolved(fqn),
                Some(first.clone()),
            );
            ChainResult::Value(self.local_value_type(&ty))
        } else if let Some((owner, ty)) = self.resolver.resolve_field_in_scope(first, &self.scopes)
        {
            let target = member_fqn(&owner, first);
            let value_ty = self.member_value_type(&owner, &ty);
            self.relate(
                RelationKind::Reads,
                &src,
                Reference::Resolved(target),
                Some(first.clone()),
            );
            ChainResult::Value(value_ty)
        } else {
            // Type-prefix scan: shortest prefix that names a type
            let mut found: Option<(String, usize)> = None;
            if let Reference::Resolved(fqn) = self.resolver.resolve_type_name(first, &self.scopes)
            {
                found = Some((fqn, 1));
            } else {
                for k in 2..=segments.len() {
                    let joined = segments[..k].join(".");
                    if let Some(fqn) = self.resolver.canonicalize_qualified(&joined) {
                        found = Some((fqn, k));
                        break;
                    }
                }
            }
            match found {
                None => {
                    self.relate(
                        RelationKind::Uses,
                        &src,
                        Reference::Unresolved,
                        Some(segments.join(".")),
                    );
                    return ChainResult::Unknown;
                }
                Some((fqn, consumed)) => {
                    self.relate(
                        RelationKind::Uses,
                        &src,
                        Reference::Resolved(fqn.clone()),
                        Some(segments[consumed - 1].clone()),
                    );
                    idx = consumed;
                    ChainResult::Type(fqn)
                }
            }
        };

        while idx < segments.len() {
            let segment = &segments[idx];
            state = match state {
                ChainResult::Type(t) => {
                    let nested = nested_type_fqn(&t, segment);
                    if self.resolver.lookup(&nested).is_some() {
                        self.relate(
                            RelationKind::Uses,
                            &src,
                            Reference::Resolved(nested.clone()),
                            Some(segment.clone()),
                        );
                        ChainResult::Type(nested)
                    } else if let Some((owner, ty)) = self.resolver.resolve_field(&t, segment) {
                        let target = member_fqn(&owner, segment);
                        let value_ty = self.member_value_type(&owner, &ty);
                        self.relate(
                            RelationKind::Reads,
                            &src,
                            Reference::Resolved(target),
                            Some(segment.clone()),
                        );
                        ChainResult::Value(value_ty)
                    } else {
                        self.relate(
                            RelationKind::Reads,
                            &src,
                            Reference::Unresolved,
                            Some(segment.clone()),
                        );
                        ChainResult::Value(None)
                    }
                }
                ChainResult::Value(Some(t)) => {
                    if let Some((owner, ty)) = self.resolver.resolve_field(&t, segment) {
                        let target = member_fqn(&owner, segment);
                        let value_ty = self.member_value_type(&owner, &ty);
                        self.relate(
                            RelationKind::Reads,
                            &src,
                            Reference::Resolved(target),
                            Some(segment.clone()),
                        );
                        ChainResult::Value(value_ty)
                    } else {
                        self.relate(
                            RelationKind::Reads,
                            &src,
                            Reference::Unresolved,
                            Some(segment.clone()),
                        );
                        ChainResult::Value(None)
                    }
                }
                ChainResult::Value(None) | ChainResult::Unknown => {
                    self.relate(
                        RelationKind::Reads,
                        &src,
                        Reference::Unresolved,
                        Some(segment.clone()),
                    );
                    ChainResult::Value(None)
                }
            };
            idx += 1;
        }
        state
    }

    fn method_invocation(&mut self, node: &Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node).to_string();
        let args = node.child_by_field_name("arguments");
        let arg_types = self.argument_types(args);
        let src = self.source_fqn();

        let target = match node.child_by_field_name("object") {
            None => {
                self.resolver
                    .resolve_unqualified_method(&name, &arg_types, &self.scopes)
                    .0
            }
            Some(object) => {
                let receiver = self.resolve_receiver(&object);
                match receiver {
                    ChainResult::Type(t) | ChainResult::Value(Some(t)) => {
                        self.resolver
                            .resolve_method(&t, &name, &arg_types, &self.scopes)
                            .0
                    }
                    _ => Reference::Unresolved,
                }
            }
        };
        self.relate(RelationKind::Calls, &src, target, Some(name));
        self.walk_arguments(args);
    }

    fn resolve_receiver(&mut self, object: &Node) -> ChainResult {
        match object.kind() {
            "this" => ChainResult::Value(self.scopes.enclosing_type().map(String::from)),
            "super" => {
                let current = self.scopes.enclosing_type().map(String::from);
                ChainResult::Value(current.and_then(|c| self.resolved_superclass(&c)))
            }
            "identifier" | "field_access" => {
                if let Some(segments) = dotted_segments(object, self.source) {
                    self.resolve_dotted_receiver(&segments)
                } else {
                    self.walk_expr(object, false);
                    ChainResult::Value(self.static_type_of(object))
                }
            }
            _ => {
                self.walk_expr(object, false);
                ChainResult::Value(self.static_type_of(object))
            }
        }
    }

    fn object_creation(&mut self, node: &Node) {
        let Some(ty) = node.child_by_field_name("type") else {
            return;
        };
        let src = self.source_fqn();
        let reference = self.resolve_type_node(&ty);
        let context = strip_generics(self.text(&ty)).trim().to_string();
        let args = node.child_by_field_name("arguments");
        let arg_types = self.argument_types(args);
        let body = find_child_by_kind(node, "class_body");

        let is_interface = reference
            .fqn()
            .and_then(|f| self.resolver.lookup(f))
            .map(|d| d.is_interface)
            .unwrap_or(false);

        // Anonymous interface implementations call no constructor
        if !is_interface {
            let target = match reference.fqn() {
                Some(fqn) => {
                    self.resolver
                        .resolve_method(fqn, "<init>", &arg_types, &self.scopes)
                        .0
                }
                None => Reference::Unresolved,
            };
            self.relate(RelationKind::Calls, &src, target, Some(context.clone()));
        }
        self.emit_type_use(&ty, &src);
        self.walk_arguments(args);

        if let Some(body) = body {
            let outer = self
                .scopes
                .enclosing_type()
                .unwrap_or(&self.package)
                .to_string();
            let enclosing = self.scopes.innermost_entity().map(String::from);
            let anon = self.registry.next_anonymous_fqn(&outer);
            self.register_runtime_type(&body, &anon, reference.fqn().map(String::from), is_interface);
            self.register_node(&body, anon.clone(), EntityKind::Class, Vec::new(), enclosing.clone());
            self.relate_inside(&anon, &enclosing);
            let relation = if is_interface {
                RelationKind::Implements
            } else {
                RelationKind::Extends
            };
            self.relate(relation, &anon, reference, Some(context));
            self.scopes.push_type(anon.clone(), Vec::new());
            let mut declares_ctor = false;
            self.walk_type_body(&body, &anon, &mut declares_ctor);
            self.scopes.pop();
        }
    }

    fn walk_lambda(&mut self, node: &Node) {
        let callable = self.source_fqn();
        self.scopes.push_block();
        if let Some(params) = node.child_by_field_name("parameters") {
            match params.kind() {
                "identifier" => self.declare_lambda_param(&params, &callable, None),
                "inferred_parameters" => {
                    for ident in named_children(&params) {
                        self.declare_lambda_param(&ident, &callable, None);
                    }
                }
                "formal_parameters" => {
                    // Reuse the declared-parameter path, minus PARAM relations:
                    // lambdas are not callables of their own
                    let infos = parameter_infos(node, self.source);
                    for info in infos {
                        let ty_text = Some(info.ty_text.clone());
                        if let Some(ty) = &info.ty_node {
                            self.emit_type_use(ty, &callable);
                        }
                        self.declare_lambda_param_named(
                            &info.node,
                            &info.name,
                            &callable,
                            ty_text,
                        );
                    }
                }
                _ => {}
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_node(&body);
        }
        self.scopes.pop();
    }

    fn declare_lambda_param(&mut self, name_node: &Node, callable: &str, ty: Option<String>) {
        let name = self.text(name_node).to_string();
        self.declare_lambda_param_named(name_node, &name, callable, ty);
    }

    fn declare_lambda_param_named(
        &mut self,
        node: &Node,
        name: &str,
        callable: &str,
        ty: Option<String>,
    ) {
        let fqn = self.registry.next_local_fqn(callable, name);
        self.register_node(
            node,
            fqn.clone(),
            EntityKind::Parameter,
            Vec::new(),
            Some(callable.to_string()),
        );
        self.relate_inside(&fqn, &Some(callable.to_string()));
        self.scopes
            .declare_local(name.to_string(), LocalBinding { fqn, ty });
    }

    fn method_reference(&mut self, node: &Node) {
        let src = self.source_fqn();
        let full = self.text(node).to_string();
        let Some((_, method_name)) = full.rsplit_once("::") else {
            return;
        };
        let method_name = method_name.trim();
        let lookup_name = if method_name == "new" {
            "<init>"
        } else {
            method_name
        };

        let qualifier = named_children(node).into_iter().next();
        let receiver = match &qualifier {
            None => ChainResult::Unknown,
            Some(q) => match q.kind() {
                "this" => ChainResult::Value(self.scopes.enclosing_type().map(String::from)),
                "super" => {
                    let current = self.scopes.enclosing_type().map(String::from);
                    ChainResult::Value(current.and_then(|c| self.resolved_superclass(&c)))
                }
                "identifier" | "field_access" | "type_identifier" | "scoped_type_identifier" => {
                    let stripped = strip_generics(self.text(q));
                    let segments: Vec<String> =
                        stripped.trim().split('.').map(String::from).collect();
                    self.resolve_dotted_receiver(&segments)
                }
                "generic_type" | "array_type" => {
                    self.emit_type_use(q, &src);
                    match self.resolve_type_node(q) {
                        Reference::Resolved(fqn) => ChainResult::Type(fqn),
                        Reference::Unresolved => ChainResult::Unknown,
                    }
                }
                _ => {
                    self.walk_expr(q, false);
                    ChainResult::Value(self.static_type_of(q))
                }
            },
        };

        let target = match receiver {
            ChainResult::Type(t) | ChainResult::Value(Some(t)) => {
                self.resolver
                    .resolve_unique_method(&t, lookup_name, &self.scopes)
            }
            _ => Reference::Unresolved,
        };
        self.relate(RelationKind::Calls, &src, target, Some(full));
    }

    fn argument_types(&self, args: Option<Node>) -> Vec<Option<String>> {
        match args {
            Some(args) => named_children(&args)
                .iter()
                .map(|n| self.static_type_of(n))
                .collect(),
            None => Vec::new(),
        }
    }

    fn walk_arguments(&mut self, args: Option<Node>) {
        if let Some(args) = args {
            for arg in named_children(&args) {
                self.walk_expr(&arg, false);
            }
        }
    }

    // ---- static typing (pure, no fact emission) ----

    fn static_type_of(&self, node: &Node) -> Option<String> {
        match node.kind() {
            "identifier" => {
                let name = self.text(node);
                if let Some(binding) = self.scopes.lookup_local(name) {
                    let ty = binding.ty.clone();
                    return self.local_value_type(&ty);
                }
                if let Some((owner, ty)) =
                    self.resolver.resolve_field_in_scope(name, &self.scopes)
                {
                    return self.member_value_type(&owner, &ty);
                }
                None
            }
            "this" => self.scopes.enclosing_type().map(String::from),
            "super" => {
                let current = self.scopes.enclosing_type()?;
                self.resolved_superclass(current)
            }
            "field_access" => {
                if let Some(segments) = dotted_segments(node, self.source) {
                    return self.dotted_static_type(&segments);
                }
                let object = node.child_by_field_name("object")?;
                let field = node.child_by_field_name("field")?;
                let obj_ty = self.static_type_of(&object)?;
                let (owner, ty) = self.resolver.resolve_field(&obj_ty, self.text(&field))?;
                self.member_value_type(&owner, &ty)
            }
            "method_invocation" => {
                let name_node = node.child_by_field_name("name")?;
                let name = self.text(&name_node);
                let arg_types = self.argument_types(node.child_by_field_name("arguments"));
                let receiver_ty = match node.child_by_field_name("object") {
                    None => self.scopes.enclosing_type().map(String::from),
                    Some(obj) => self.static_type_of(&obj),
                }?;
                let (_, ret) =
                    self.resolver
                        .resolve_method(&receiver_ty, name, &arg_types, &self.scopes);
                let ret = ret?;
                self.member_value_type(&receiver_ty, &ret)
            }
            "object_creation_expression" | "cast_expression" => {
                let ty = node.child_by_field_name("type")?;
                self.resolve_type_node(&ty).fqn().map(String::from)
            }
            "parenthesized_expression" => {
                let inner = named_children(node).into_iter().next()?;
                self.static_type_of(&inner)
            }
            "array_access" => {
                let array = node.child_by_field_name("array")?;
                let ty = self.static_type_of(&array)?;
                ty.strip_suffix("[]").map(String::from)
            }
            "unary_expression" => {
                let operand = node.child_by_field_name("operand")?;
                self.static_type_of(&operand)
            }
            "update_expression" => {
                let operand = named_children(node).into_iter().next()?;
                self.static_type_of(&operand)
            }
            "string_literal" => Some("java.lang.String".to_string()),
            "character_literal" => Some("char".to_string()),
            "true" | "false" => Some("boolean".to_string()),
            "class_literal" => Some("java.lang.Class".to_string()),
            "decimal_integer_literal"
            | "hex_integer_literal"
            | "octal_integer_literal"
            | "binary_integer_literal" => {
                let text = self.text(node);
                if text.ends_with('l') || text.ends_with('L') {
                    Some("long".to_string())
                } else {
                    Some("int".to_string())
                }
            }
            "decimal_floating_point_literal" | "hex_floating_point_literal" => {
                let text = self.text(node);
                if text.ends_with('f') || text.ends_with('F') {
                    Some("float".to_string())
                } else {
                    Some("double".to_string())
                }
            }
            _ => None,
        }
    }

    /// Pure analogue of [`Self::resolve_dotted_receiver`], for typing only.
    fn dotted_static_type(&self, segments: &[String]) -> Option<String> {
        let first = segments.first()?;
        let mut idx = 1;
        let mut ty: Option<String>;

        if let Some(binding) = self.scopes.lookup_local(first) {
            let binding_ty = binding.ty.clone();
            ty = self.local_value_type(&binding_ty);
        } else if let Some((owner, fty)) =
            self.resolver.resolve_field_in_scope(first, &self.scopes)
        {
            ty = self.member_value_type(&owner, &fty);
        } else if let Reference::Resolved(fqn) =
            self.resolver.resolve_type_name(first, &self.scopes)
        {
            ty = Some(fqn);
        } else {
            let mut found = None;
            for k in 2..=segments.len() {
                if let Some(fqn) = self.resolver.canonicalize_qualified(&segments[..k].join(".")) {
                    found = Some((fqn, k));
                    break;
                }
            }
            let (fqn, consumed) = found?;
            ty = Some(fqn);
            idx = consumed;
        }

        while idx < segments.len() {
            let current = ty?;
            let segment = &segments[idx];
            let nested = nested_type_fqn(&current, segment);
            if self.resolver.lookup(&nested).is_some() {
                ty = Some(nested);
            } else if let Some((owner, fty)) = self.resolver.resolve_field(&current, segment) {
                ty = self.member_value_type(&owner, &fty);
            } else {
                return None;
            }
            idx += 1;
        }
        ty
    }

    /// Resolve a local binding's declared type text to a usable FQN.
    fn local_value_type(&self, binding_ty: &Option<String>) -> Option<String> {
        let text = binding_ty.as_deref()?;
        let stripped = strip_generics(text);
        let stripped = stripped.trim();
        let root = stripped.trim_end_matches("[]");
        let suffix = &stripped[root.len()..];
        if crate::resolver::is_primitive(root) {
            return Some(format!("{}{}", root, suffix));
        }
        match self.resolver.resolve_type_name(root, &self.scopes) {
            Reference::Resolved(fqn) => Some(format!("{}{}", fqn, suffix)),
            Reference::Unresolved => None,
        }
    }

    /// Resolve a member's declared type against its owner's context.
    fn member_value_type(&self, owner_fqn: &str, ty_text: &str) -> Option<String> {
        let descriptor = self.resolver.lookup(owner_fqn)?.clone();
        self.resolver
            .resolve_member_type(&descriptor, ty_text, &self.scopes)
    }

    // ---- type references ----

    /// Resolve a syntactic type node to a reference, without emitting facts.
    fn resolve_type_node(&self, node: &Node) -> Reference {
        match node.kind() {
            "array_type" => node
                .child_by_field_name("element")
                .map(|e| self.resolve_type_node(&e))
                .unwrap_or(Reference::Unresolved),
            "generic_type" => named_children(node)
                .into_iter()
                .find(|c| c.kind() != "type_arguments")
                .map(|base| self.resolve_type_node(&base))
                .unwrap_or(Reference::Unresolved),
            "integral_type" | "floating_point_type" | "boolean_type" | "void_type" => {
                Reference::Resolved(self.text(node).to_string())
            }
            _ => self.resolver.resolve_type_name(self.text(node), &self.scopes),
        }
    }

    /// Emit USES facts for a syntactic type reference: one per resolvable
    /// named component, generic arguments and array element types included.
    fn emit_type_use(&mut self, node: &Node, source: &str) {
        match node.kind() {
            "array_type" => {
                if let Some(element) = node.child_by_field_name("element") {
                    self.emit_type_use(&element, source);
                }
            }
            "generic_type" => {
                for child in named_children(node) {
                    if child.kind() == "type_arguments" {
                        for arg in named_children(&child) {
                            if arg.kind() == "wildcard" {
                                for bound in named_children(&arg) {
                                    if is_type_node(bound.kind()) {
                                        self.emit_type_use(&bound, source);
                                    }
                                }
                            } else if is_type_node(arg.kind()) {
                                self.emit_type_use(&arg, source);
                            }
                        }
                    } else {
                        self.emit_type_use(&child, source);
                    }
                }
            }
            "integral_type" | "floating_point_type" | "boolean_type" | "void_type" => {
                let text = self.text(node).to_string();
                self.relate(
                    RelationKind::Uses,
                    source,
                    Reference::Resolved(text.clone()),
                    Some(text),
                );
            }
            "scoped_type_identifier" => {
                let text = self.text(node).to_string();
                self.emit_dotted_type_use(&text, source);
            }
            "wildcard" => {
                for bound in named_children(node) {
                    if is_type_node(bound.kind()) {
                        self.emit_type_use(&bound, source);
                    }
                }
            }
            _ => {
                let text = self.text(node).to_string();
                self.emit_dotted_type_use(&text, source);
            }
        }
    }

    /// USES facts for a dotted type name: one per prefix that resolves to a
    /// type (package prefixes stay silent), the final segment always emitted
    /// even when unresolved.
    fn emit_dotted_type_use(&mut self, text: &str, source: &str) {
        let stripped = strip_generics(text);
        let stripped = stripped.trim();
        let segments: Vec<&str> = stripped.split('.').collect();
        for i in 1..=segments.len() {
            let prefix = segments[..i].join(".");
            let reference = self.resolver.resolve_type_name(&prefix, &self.scopes);
            let last = i == segments.len();
            match (&reference, last) {
                (Reference::Resolved(_), _) | (Reference::Unresolved, true) => {
                    self.relate(
                        RelationKind::Uses,
                        source,
                        reference,
                        Some(segments[i - 1].to_string()),
                    );
                }
                (Reference::Unresolved, false) => {}
            }
        }
    }
}

/// Decompose a pure `a.b.c` chain of identifiers; None as soon as any link
/// is a computed expression.
fn dotted_segments(node: &Node, source: &str) -> Option<Vec<String>> {
    match node.kind() {
        "identifier" => Some(vec![node_text(node, source).to_string()]),
        "field_access" => {
            let object = node.child_by_field_name("object")?;
            let field = node.child_by_field_name("field")?;
            if field.kind() != "identifier" {
                return None;
            }
            let mut segments = dotted_segments(&object, source)?;
            segments.push(node_text(&field, source).to_string());
            Some(segments)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classpath::InMemoryTypeIndex;
    use crate::parse::parse_unit;

    fn walk(source: &str, index: &InMemoryTypeIndex) -> Vec<Fact> {
        let unit = parse_unit(source).expect("valid source");
        walk_unit(&unit, source, index)
    }

    fn entity_fqns(facts: &[Fact]) -> Vec<String> {
        facts
            .iter()
            .filter_map(|f| match f {
                Fact::Entity(e) => Some(e.fqn.clone()),
                Fact::Relation(_) => None,
            })
            .collect()
    }

    fn relations_of(facts: &[Fact], kind: RelationKind) -> Vec<&Relation> {
        facts
            .iter()
            .filter_map(|f| match f {
                Fact::Relation(r) if r.kind == kind => Some(r),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn scan_collects_package_imports_and_types() {
        let source = "package q;\n\
                      import java.util.List;\n\
                      import java.util.*;\n\
                      import static java.lang.Math.max;\n\
                      class C {}\n";
        let unit = parse_unit(source).unwrap();
        let scope = scan_unit(&unit.root(), source);
        assert_eq!(scope.package, "q");
        assert_eq!(
            scope.single_imports.get("List").map(String::as_str),
            Some("java.util.List")
        );
        assert_eq!(scope.wildcard_imports, vec!["java.util"]);
        // Static imports name members, not types
        assert!(!scope.single_imports.contains_key("max"));
        assert_eq!(
            scope.top_level_names.get("C").map(String::as_str),
            Some("q.C")
        );
        // Pre-scan synthesizes the default constructor descriptor
        let c = scope.unit_types.get("q.C").unwrap();
        assert_eq!(c.methods_named("<init>").count(), 1);
    }

    #[test]
    fn default_package_types_get_bare_fqns() {
        let source = "class Standalone {}";
        let unit = parse_unit(source).unwrap();
        let scope = scan_unit(&unit.root(), source);
        assert_eq!(scope.package, DEFAULT_PACKAGE);
        assert!(scope.unit_types.contains_key("Standalone"));
    }

    #[test]
    fn simple_class_stream_shape() {
        let index = InMemoryTypeIndex::with_jdk_root();
        let source = "package p;\n\
                      class A {\n\
                          int count;\n\
                          void bump(int by) { count = count + by; }\n\
                      }\n";
        let facts = walk(source, &index);

        assert_eq!(
            entity_fqns(&facts),
            vec![
                "p.A",
                "p.A.count",
                "p.A.bump(int)",
                "p.A.bump(int)#by",
                "p.A.<init>()",
            ]
        );

        // One INSIDE per entity; the top-level class targets the package
        let insides = relations_of(&facts, RelationKind::Inside);
        assert_eq!(insides.len(), 5);
        assert_eq!(insides[0].source, "p.A");
        assert_eq!(insides[0].target, Reference::Resolved("p".to_string()));
        assert!(insides.iter().all(|r| r.context.is_none()));

        // Assignment: write to the field, reads of field and parameter
        let writes = relations_of(&facts, RelationKind::Writes);
        assert_eq!(writes.len(), 1);
        assert_eq!(
            writes[0].target,
            Reference::Resolved("p.A.count".to_string())
        );
        assert_eq!(writes[0].source, "p.A.bump(int)");
        let reads = relations_of(&facts, RelationKind::Reads);
        let read_targets: Vec<_> = reads.iter().filter_map(|r| r.target.fqn()).collect();
        assert!(read_targets.contains(&"p.A.count"));
        assert!(read_targets.contains(&"p.A.bump(int)#by"));

        // Implicit constructor chains to Object, with no written context
        let calls = relations_of(&facts, RelationKind::Calls);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].source, "p.A.<init>()");
        assert_eq!(
            calls[0].target,
            Reference::Resolved("java.lang.Object.<init>()".to_string())
        );
        assert_eq!(calls[0].context, None);
    }

    #[test]
    fn synthetic_constructor_comes_after_members() {
        let index = InMemoryTypeIndex::with_jdk_root();
        let source = "package p; class A { void f() {} }";
        let facts = walk(source, &index);
        let fqns = entity_fqns(&facts);
        let method = fqns.iter().position(|f| f == "p.A.f()").unwrap();
        let ctor = fqns.iter().position(|f| f == "p.A.<init>()").unwrap();
        assert!(ctor > method);
    }

    #[test]
    fn declared_constructor_suppresses_synthetic_one() {
        let index = InMemoryTypeIndex::with_jdk_root();
        let source = "package p; class A { A(int x) {} }";
        let facts = walk(source, &index);
        let fqns = entity_fqns(&facts);
        assert!(fqns.contains(&"p.A.<init>(int)".to_string()));
        assert!(!fqns.contains(&"p.A.<init>()".to_string()));
        // The declared body still chains implicitly
        let calls = relations_of(&facts, RelationKind::Calls);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].source, "p.A.<init>(int)");
        assert_eq!(calls[0].context, None);
    }

    #[test]
    fn extends_nested_type_emits_uses_per_segment() {
        let mut index = InMemoryTypeIndex::with_jdk_root();
        index.insert(
            TypeDescriptor::new("com.example.ClassType").with_default_constructor(),
        );
        index
            .insert(TypeDescriptor::new("com.example.ClassType$Inner").with_default_constructor());
        let source = "package p;\n\
                      import com.example.ClassType;\n\
                      class B extends ClassType.Inner {}\n";
        let facts = walk(source, &index);

        let extends = relations_of(&facts, RelationKind::Extends);
        assert_eq!(extends.len(), 1);
        assert_eq!(
            extends[0].target,
            Reference::Resolved("com.example.ClassType$Inner".to_string())
        );
        assert_eq!(extends[0].context.as_deref(), Some("ClassType.Inner"));

        // One USES per named segment, outer first
        let uses = relations_of(&facts, RelationKind::Uses);
        assert_eq!(uses.len(), 2);
        assert_eq!(
            uses[0].target,
            Reference::Resolved("com.example.ClassType".to_string())
        );
        assert_eq!(uses[0].context.as_deref(), Some("ClassType"));
        assert_eq!(
            uses[1].target,
            Reference::Resolved("com.example.ClassType$Inner".to_string())
        );
        assert_eq!(uses[1].context.as_deref(), Some("Inner"));

        // The synthetic constructor chains to the inner class constructor
        let calls = relations_of(&facts, RelationKind::Calls);
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].target,
            Reference::Resolved("com.example.ClassType$Inner.<init>()".to_string())
        );
    }

    #[test]
    fn enum_constants_call_their_constructor() {
        let index = InMemoryTypeIndex::with_jdk_root();
        let source = "package p; enum Color { RED, GREEN }";
        let facts = walk(source, &index);
        assert_eq!(
            entity_fqns(&facts),
            vec!["p.Color", "p.Color.RED", "p.Color.GREEN", "p.Color.<init>()"]
        );
        let calls = relations_of(&facts, RelationKind::Calls);
        assert_eq!(calls.len(), 2);
        for call in &calls {
            assert_eq!(
                call.target,
                Reference::Resolved("p.Color.<init>()".to_string())
            );
        }
        assert_eq!(calls[0].context.as_deref(), Some("RED"));
        assert_eq!(calls[1].context.as_deref(), Some("GREEN"));
    }

    #[test]
    fn compound_assignment_reads_and_writes() {
        let index = InMemoryTypeIndex::with_jdk_root();
        let source = "package p; class A { void f() { int i = 0; i += 1; } }";
        let facts = walk(source, &index);
        let local = "p.A.f()#i";
        let writes = relations_of(&facts, RelationKind::Writes);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].target, Reference::Resolved(local.to_string()));
        let reads = relations_of(&facts, RelationKind::Reads);
        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0].target, Reference::Resolved(local.to_string()));
    }

    #[test]
    fn unqualified_call_resolves_through_enclosing_type() {
        let index = InMemoryTypeIndex::with_jdk_root();
        let source = "package p;\n\
                      class A {\n\
                          void helper() {}\n\
                          void f() { helper(); }\n\
                      }\n";
        let facts = walk(source, &index);
        let calls = relations_of(&facts, RelationKind::Calls);
        let helper_call = calls
            .iter()
            .find(|c| c.context.as_deref() == Some("helper"))
            .unwrap();
        assert_eq!(helper_call.source, "p.A.f()");
        assert_eq!(
            helper_call.target,
            Reference::Resolved("p.A.helper()".to_string())
        );
    }

    #[test]
    fn ambiguous_overload_call_is_unresolved() {
        let index = InMemoryTypeIndex::with_jdk_root();
        let source = "package p;\n\
                      class A {\n\
                          void run(int x) {}\n\
                          void run(boolean x) {}\n\
                          void f(Object o) { run(pick()); }\n\
                          Object pick() { return null; }\n\
                      }\n";
        let facts = walk(source, &index);
        let calls = relations_of(&facts, RelationKind::Calls);
        let run_call = calls
            .iter()
            .find(|c| c.context.as_deref() == Some("run"))
            .unwrap();
        // Two arity-1 candidates and no static argument type: no guess
        assert_eq!(run_call.target, Reference::Unresolved);
    }

    #[test]
    fn static_field_chain_via_type_prefix() {
        let mut index = InMemoryTypeIndex::with_jdk_root();
        index.insert(
            TypeDescriptor::new("java.lang.System").with_field("out", "java.io.PrintStream"),
        );
        index.insert(TypeDescriptor::new("java.io.PrintStream").with_method(
            "println",
            vec!["java.lang.String".to_string()],
            Some("void".to_string()),
        ));
        let source = r#"package p; class A { void f() { System.out.println("hi"); } }"#;
        let facts = walk(source, &index);

        let uses = relations_of(&facts, RelationKind::Uses);
        assert!(uses.iter().any(|u| {
            u.target == Reference::Resolved("java.lang.System".to_string())
                && u.context.as_deref() == Some("System")
        }));
        let reads = relations_of(&facts, RelationKind::Reads);
        assert!(reads
            .iter()
            .any(|r| r.target == Reference::Resolved("java.lang.System.out".to_string())));
        let calls = relations_of(&facts, RelationKind::Calls);
        let println = calls
            .iter()
            .find(|c| c.context.as_deref() == Some("println"))
            .unwrap();
        assert_eq!(
            println.target,
            Reference::Resolved("java.io.PrintStream.println(java.lang.String)".to_string())
        );
    }

    #[test]
    fn anonymous_class_implements_interface() {
        let mut index = InMemoryTypeIndex::with_jdk_root();
        index.insert(
            TypeDescriptor::new("java.lang.Runnable")
                .as_interface()
                .with_method("run", vec![], Some("void".to_string())),
        );
        let source = "package p;\n\
                      class A {\n\
                          void f() {\n\
                              Runnable r = new Runnable() { public void run() {} };\n\
                          }\n\
                      }\n";
        let facts = walk(source, &index);
        let fqns = entity_fqns(&facts);
        assert!(fqns.contains(&"p.A$1".to_string()));
        assert!(fqns.contains(&"p.A$1.run()".to_string()));
        let implements = relations_of(&facts, RelationKind::Implements);
        assert_eq!(implements.len(), 1);
        assert_eq!(implements[0].source, "p.A$1");
        assert_eq!(
            implements[0].target,
            Reference::Resolved("java.lang.Runnable".to_string())
        );
        // No constructor call for an anonymous interface implementation
        let calls = relations_of(&facts, RelationKind::Calls);
        assert!(calls.iter().all(|c| c.source != "p.A.f()"));
    }

    #[test]
    fn local_variable_shadowing_gets_ordinal() {
        let index = InMemoryTypeIndex::with_jdk_root();
        let source = "package p;\n\
                      class A {\n\
                          void f() {\n\
                              int x = 1;\n\
                              { int x = 2; x = 3; }\n\
                          }\n\
                      }\n";
        let facts = walk(source, &index);
        let fqns = entity_fqns(&facts);
        assert!(fqns.contains(&"p.A.f()#x".to_string()));
        assert!(fqns.contains(&"p.A.f()#x#2".to_string()));
        // The inner write targets the shadowing declaration
        let writes = relations_of(&facts, RelationKind::Writes);
        assert_eq!(writes.len(), 1);
        assert_eq!(
            writes[0].target,
            Reference::Resolved("p.A.f()#x#2".to_string())
        );
    }

    #[test]
    fn throws_clause_relates_and_uses() {
        let mut index = InMemoryTypeIndex::with_jdk_root();
        index.insert(TypeDescriptor::new("java.io.IOException"));
        let source = "package p;\n\
                      import java.io.IOException;\n\
                      class A { void f() throws IOException {} }\n";
        let facts = walk(source, &index);
        let throws = relations_of(&facts, RelationKind::Throws);
        assert_eq!(throws.len(), 1);
        assert_eq!(throws[0].source, "p.A.f()");
        assert_eq!(
            throws[0].target,
            Reference::Resolved("java.io.IOException".to_string())
        );
        assert_eq!(throws[0].context.as_deref(), Some("IOException"));
        let uses = relations_of(&facts, RelationKind::Uses);
        assert!(uses
            .iter()
            .any(|u| u.source == "p.A.f()"
                && u.target == Reference::Resolved("java.io.IOException".to_string())));
    }

    #[test]
    fn annotations_emit_annotated_by() {
        let mut index = InMemoryTypeIndex::with_jdk_root();
        index.insert(TypeDescriptor::new("java.lang.Deprecated").as_interface());
        let source = "package p; @Deprecated class A {}";
        let facts = walk(source, &index);
        let annotated = relations_of(&facts, RelationKind::AnnotatedBy);
        assert_eq!(annotated.len(), 1);
        assert_eq!(annotated[0].source, "p.A");
        assert_eq!(
            annotated[0].target,
            Reference::Resolved("java.lang.Deprecated".to_string())
        );
        assert_eq!(annotated[0].context.as_deref(), Some("Deprecated"));
    }

    #[test]
    fn local_class_fqn_uses_occurrence_counter() {
        let index = InMemoryTypeIndex::with_jdk_root();
        let source = "package p;\n\
                      class A {\n\
                          void f() { class Helper {} }\n\
                      }\n";
        let facts = walk(source, &index);
        let fqns = entity_fqns(&facts);
        assert!(fqns.contains(&"p.A$1Helper".to_string()));
        // Local classes nest inside the method, not the type
        let insides = relations_of(&facts, RelationKind::Inside);
        let helper = insides.iter().find(|r| r.source == "p.A$1Helper").unwrap();
        assert_eq!(helper.target, Reference::Resolved("p.A.f()".to_string()));
    }

    #[test]
    fn unknown_receiver_chain_is_explicitly_unresolved() {
        let index = InMemoryTypeIndex::with_jdk_root();
        let source = "package p; class A { void f() { mystery.call(); } }";
        let facts = walk(source, &index);
        // The receiver resolves to neither a binding nor a type; the only
        // other USES is the method's void return type
        let uses = relations_of(&facts, RelationKind::Uses);
        assert_eq!(uses.len(), 2);
        let mystery = uses
            .iter()
            .find(|u| u.context.as_deref() == Some("mystery"))
            .unwrap();
        assert_eq!(mystery.target, Reference::Unresolved);
        let calls = relations_of(&facts, RelationKind::Calls);
        assert_eq!(calls.iter().filter(|c| c.source == "p.A.f()").count(), 1);
        let call = calls.iter().find(|c| c.source == "p.A.f()").unwrap();
        assert_eq!(call.target, Reference::Unresolved);
    }

    #[test]
    fn scan_captures_type_parameter_names() {
        let source = "package p; class Box<T, U extends Number> { T item; }";
        let unit = parse_unit(source).unwrap();
        let scope = scan_unit(&unit.root(), source);
        let descriptor = scope.unit_types.get("p.Box").unwrap();
        assert_eq!(descriptor.type_params, vec!["T", "U"]);
    }

    #[test]
    fn type_variables_erase_in_callable_fqns() {
        let index = InMemoryTypeIndex::with_jdk_root();
        let source = "package p;\n\
                      class Box<T> {\n\
                          void put(T value) {}\n\
                          <E> void copy(E item, T slot) {}\n\
                      }\n";
        let facts = walk(source, &index);
        let fqns = entity_fqns(&facts);
        assert!(fqns.contains(&"p.Box.put(java.lang.Object)".to_string()));
        assert!(fqns.contains(&"p.Box.copy(java.lang.Object,java.lang.Object)".to_string()));
    }

    #[test]
    fn inherited_method_resolves_through_imported_superclass() {
        let mut index = InMemoryTypeIndex::with_jdk_root();
        index.insert(
            TypeDescriptor::new("lib.Base")
                .with_default_constructor()
                .with_method("render", vec![], Some("void".to_string())),
        );
        let source = "package p;\n\
                      import lib.Base;\n\
                      class Widget extends Base {\n\
                          void draw() { render(); }\n\
                      }\n";
        let facts = walk(source, &index);
        let calls = relations_of(&facts, RelationKind::Calls);
        let render = calls
            .iter()
            .find(|c| c.context.as_deref() == Some("render"))
            .unwrap();
        assert_eq!(
            render.target,
            Reference::Resolved("lib.Base.render()".to_string())
        );
    }
}
