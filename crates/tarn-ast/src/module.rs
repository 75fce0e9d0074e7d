//! The module arena: declarations, expressions, and the parent links between
//! them.

use serde::{Deserialize, Serialize};

use crate::{Decl, DeclId, Expr, ExprId, ExprKind, FileId, Span};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("invalid module JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("declaration `{owner}` refers to missing declaration #{target}")]
    DanglingDecl { owner: String, target: u32 },
    #[error("{owner} refers to missing expression #{target}")]
    DanglingExpr { owner: String, target: u32 },
    #[error("expression #{0} has more than one parent")]
    SharedExpr(u32),
}

/// Serialized form of a module. This is the JSON shape `Module::from_json`
/// accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleData {
    pub name: String,
    #[serde(default)]
    pub file: FileId,
    /// Source text, used for fix-it previews and `source_text`.
    #[serde(default)]
    pub source: Option<String>,
    pub decls: Vec<Decl>,
    #[serde(default)]
    pub exprs: Vec<Expr>,
    /// File-scope declarations in source order.
    pub top_level: Vec<DeclId>,
}

/// Where an expression hangs in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprParent {
    Expr(ExprId),
    Decl(DeclId),
}

/// An immutable, validated module.
#[derive(Debug, Clone)]
pub struct Module {
    data: ModuleData,
    expr_parents: Vec<Option<ExprParent>>,
}

impl Module {
    pub fn from_data(data: ModuleData) -> Result<Self, LoadError> {
        let expr_parents = link(&data)?;
        Ok(Self { data, expr_parents })
    }

    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        let data: ModuleData = serde_json::from_str(text)?;
        Self::from_data(data)
    }

    pub fn to_json(&self) -> Result<String, LoadError> {
        Ok(serde_json::to_string_pretty(&self.data)?)
    }

    pub fn data(&self) -> &ModuleData {
        &self.data
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn file(&self) -> FileId {
        self.data.file
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.data.decls[id.index()]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.data.exprs[id.index()]
    }

    pub fn decl_count(&self) -> usize {
        self.data.decls.len()
    }

    pub fn expr_count(&self) -> usize {
        self.data.exprs.len()
    }

    pub fn decl_ids(&self) -> impl Iterator<Item = DeclId> + '_ {
        (0..self.data.decls.len() as u32).map(DeclId)
    }

    pub fn top_level(&self) -> &[DeclId] {
        &self.data.top_level
    }

    pub fn members(&self, id: DeclId) -> &[DeclId] {
        &self.decl(id).members
    }

    pub fn parent(&self, id: DeclId) -> Option<DeclId> {
        self.decl(id).parent
    }

    pub fn inherited(&self, id: DeclId) -> &[crate::TypeRepr] {
        &self.decl(id).inherited
    }

    pub fn expr_parent(&self, id: ExprId) -> Option<ExprParent> {
        self.expr_parents.get(id.index()).copied().flatten()
    }

    /// The declaration whose body or initializer contains `id`.
    pub fn expr_owner(&self, id: ExprId) -> Option<DeclId> {
        let mut current = id;
        loop {
            match self.expr_parent(current)? {
                ExprParent::Decl(decl) => return Some(decl),
                ExprParent::Expr(parent) => current = parent,
            }
        }
    }

    /// Source text covered by `span`, when the module carries its source.
    pub fn source_text(&self, span: Span) -> Option<&str> {
        if span.is_synthetic() || span.file != self.data.file {
            return None;
        }
        self.data
            .source
            .as_deref()?
            .get(span.start as usize..span.end as usize)
    }

    /// All declarations ordered by where they start in the source, ties
    /// broken by arena order.
    pub fn decls_in_source_order(&self) -> Vec<DeclId> {
        let mut ids: Vec<DeclId> = self.decl_ids().collect();
        ids.sort_by_key(|id| (self.decl(*id).name_span.start, *id));
        ids
    }

    pub fn lookup_top_level(&self, name: &str) -> Vec<DeclId> {
        self.data
            .top_level
            .iter()
            .copied()
            .filter(|id| self.decl(*id).name == name)
            .collect()
    }

    pub fn members_named(&self, owner: DeclId, name: &str) -> Vec<DeclId> {
        self.members(owner)
            .iter()
            .copied()
            .filter(|id| self.decl(*id).name == name)
            .collect()
    }

    /// Innermost nominal type declaration containing `id` (exclusive).
    pub fn enclosing_nominal(&self, id: DeclId) -> Option<DeclId> {
        let mut current = self.parent(id);
        while let Some(decl) = current {
            if self.decl(decl).is_nominal() {
                return Some(decl);
            }
            current = self.parent(decl);
        }
        None
    }

    /// Innermost function-like declaration containing `id` (exclusive).
    pub fn enclosing_function(&self, id: DeclId) -> Option<DeclId> {
        let mut current = self.parent(id);
        while let Some(decl) = current {
            if self.decl(decl).is_func_like() {
                return Some(decl);
            }
            current = self.parent(decl);
        }
        None
    }

    /// Whether `id` is declared inside a function body.
    pub fn is_local(&self, id: DeclId) -> bool {
        self.enclosing_function(id).is_some()
    }
}

fn link(data: &ModuleData) -> Result<Vec<Option<ExprParent>>, LoadError> {
    let decl_count = data.decls.len() as u32;
    let expr_count = data.exprs.len() as u32;
    let mut parents: Vec<Option<ExprParent>> = vec![None; data.exprs.len()];

    let check_decl = |owner: &str, target: DeclId| {
        if target.0 >= decl_count {
            Err(LoadError::DanglingDecl {
                owner: owner.to_string(),
                target: target.0,
            })
        } else {
            Ok(())
        }
    };

    let attach = |parents: &mut Vec<Option<ExprParent>>,
                      owner: String,
                      child: ExprId,
                      parent: ExprParent|
     -> Result<(), LoadError> {
        if child.0 >= expr_count {
            return Err(LoadError::DanglingExpr {
                owner,
                target: child.0,
            });
        }
        let slot = &mut parents[child.index()];
        if slot.is_some() {
            return Err(LoadError::SharedExpr(child.0));
        }
        *slot = Some(parent);
        Ok(())
    };

    for id in &data.top_level {
        check_decl("<module>", *id)?;
    }

    for (index, decl) in data.decls.iter().enumerate() {
        let id = DeclId(index as u32);
        if let Some(parent) = decl.parent {
            check_decl(&decl.name, parent)?;
        }
        for member in &decl.members {
            check_decl(&decl.name, *member)?;
        }
        let owned: Vec<ExprId> = match &decl.kind {
            crate::DeclKind::Var { init, .. } => init.iter().copied().collect(),
            crate::DeclKind::Func { body, .. } | crate::DeclKind::Init { body, .. } => {
                body.clone()
            }
            crate::DeclKind::TopLevelCode { expr } => vec![*expr],
            _ => Vec::new(),
        };
        for child in owned {
            attach(
                &mut parents,
                format!("declaration `{}`", decl.name),
                child,
                ExprParent::Decl(id),
            )?;
        }
    }

    for (index, expr) in data.exprs.iter().enumerate() {
        let id = ExprId(index as u32);
        let children = match &expr.node {
            // Closure bodies belong to the closure expression.
            ExprKind::Closure { body, .. } => body.clone(),
            other => other.children(),
        };
        for child in children {
            attach(
                &mut parents,
                format!("expression #{index}"),
                child,
                ExprParent::Expr(id),
            )?;
        }
    }

    Ok(parents)
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Incremental construction of a [`Module`], used by tests, benches, and
/// tools that synthesize modules in memory.
#[derive(Debug, Clone)]
pub struct ModuleBuilder {
    data: ModuleData,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            data: ModuleData {
                name: name.into(),
                file: FileId(0),
                source: None,
                decls: Vec::new(),
                exprs: Vec::new(),
                top_level: Vec::new(),
            },
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.data.source = Some(source.into());
        self
    }

    pub fn file(&self) -> FileId {
        self.data.file
    }

    /// Add `decl` under `parent` (or at file scope) and return its id.
    pub fn add_decl(&mut self, parent: Option<DeclId>, mut decl: Decl) -> DeclId {
        let id = DeclId(self.data.decls.len() as u32);
        decl.parent = parent;
        self.data.decls.push(decl);
        match parent {
            Some(parent) => self.data.decls[parent.index()].members.push(id),
            None => self.data.top_level.push(id),
        }
        id
    }

    pub fn add_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let id = ExprId(self.data.exprs.len() as u32);
        self.data.exprs.push(Expr::new(kind, span));
        id
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.data.decls[id.index()]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.data.exprs[id.index()]
    }

    pub fn finish(self) -> Result<Module, LoadError> {
        Module::from_data(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Argument, DeclKind, FuncSignature, Literal};

    fn sp(start: u32, end: u32) -> Span {
        Span::new(FileId(0), start, end)
    }

    fn sample() -> Module {
        // class A { func f() { g(1) } }
        let source = "class A { func f() { g(1) } }";
        let mut b = ModuleBuilder::new("main").with_source(source);
        let class = b.add_decl(None, Decl::new("A", DeclKind::Class, sp(6, 7)));
        let g = b.add_expr(ExprKind::DeclRef { name: "g".into() }, sp(21, 22));
        let one = b.add_expr(ExprKind::Literal(Literal::Int(1)), sp(23, 24));
        let call = b.add_expr(
            ExprKind::Call {
                callee: g,
                args: vec![Argument {
                    label: None,
                    value: one,
                }],
            },
            sp(21, 25),
        );
        b.add_decl(
            Some(class),
            Decl::new(
                "f",
                DeclKind::Func {
                    signature: FuncSignature::default(),
                    body: vec![call],
                },
                sp(15, 16),
            ),
        );
        b.finish().unwrap()
    }

    #[test]
    fn builder_wires_parents_and_members() {
        let module = sample();
        let class = DeclId(0);
        let func = DeclId(1);
        assert_eq!(module.top_level(), &[class]);
        assert_eq!(module.members(class), &[func]);
        assert_eq!(module.parent(func), Some(class));
        assert_eq!(module.enclosing_nominal(func), Some(class));
        assert!(!module.is_local(func));
    }

    #[test]
    fn expression_parents_are_computed() {
        let module = sample();
        assert_eq!(module.expr_parent(ExprId(0)), Some(ExprParent::Expr(ExprId(2))));
        assert_eq!(module.expr_parent(ExprId(2)), Some(ExprParent::Decl(DeclId(1))));
        assert_eq!(module.expr_owner(ExprId(1)), Some(DeclId(1)));
    }

    #[test]
    fn source_text_slices_spans() {
        let module = sample();
        assert_eq!(module.source_text(sp(21, 25)), Some("g(1)"));
        assert_eq!(module.source_text(Span::synthetic()), None);
    }

    #[test]
    fn json_round_trip_preserves_structure() {
        let module = sample();
        let json = module.to_json().unwrap();
        let reloaded = Module::from_json(&json).unwrap();
        assert_eq!(reloaded.data(), module.data());
        assert_eq!(reloaded.expr_owner(ExprId(0)), Some(DeclId(1)));
    }

    #[test]
    fn dangling_references_are_rejected() {
        let mut b = ModuleBuilder::new("bad");
        b.add_decl(
            None,
            Decl::new(
                "x",
                DeclKind::Var {
                    is_let: true,
                    ty: None,
                    init: Some(ExprId(7)),
                },
                sp(0, 1),
            ),
        );
        let err = b.finish().unwrap_err();
        assert!(matches!(err, LoadError::DanglingExpr { target: 7, .. }));
    }

    #[test]
    fn source_order_sorts_by_name_position() {
        let mut b = ModuleBuilder::new("m");
        let later = b.add_decl(None, Decl::new("b", DeclKind::Struct, sp(20, 21)));
        let earlier = b.add_decl(None, Decl::new("a", DeclKind::Struct, sp(3, 4)));
        let module = b.finish().unwrap();
        assert_eq!(module.decls_in_source_order(), vec![earlier, later]);
        assert_eq!(module.lookup_top_level("b"), vec![later]);
    }
}
