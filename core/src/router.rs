//! # Router Builder
//!
//! A radix tree over raw operation paths. Static edges are split at their
//! longest common prefix, every `{param}` gets a node of its own, and leaves
//! multiplex routes by HTTP method.
//!
//! Children are kept in two lists: static children sorted by their first
//! byte, then parameter children. A matcher tries them in that order.

use crate::error::{AppError, AppResult};
use crate::ir::{self, PathPart};
use crate::spec::path::find_param;
use crate::spec::ParameterIn;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// One operation reachable at a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    /// Upper-case HTTP method.
    pub method: String,
    /// Index of the operation.
    pub operation: usize,
    /// Raw path template.
    pub path: String,
}

/// Node of the route tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteNode {
    /// Literal prefix (the `{name}` placeholder for parameter nodes).
    pub prefix: String,
    /// First byte of the prefix.
    pub head: u8,
    /// Parameter name of a parameter node.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub param_name: String,
    /// Index of the parameter in the owning operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<usize>,
    /// Static children, sorted by head.
    pub static_children: Vec<RouteNode>,
    /// Parameter children.
    pub param_children: Vec<RouteNode>,
    /// Routes ending here, sorted by method.
    pub routes: Vec<Route>,
}

impl RouteNode {
    fn leaf(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            head: prefix.as_bytes().first().copied().unwrap_or_default(),
            ..Default::default()
        }
    }

    /// Whether the node matches literal text.
    pub fn is_static(&self) -> bool {
        self.param.is_none()
    }

    /// Whether the node captures a parameter.
    pub fn is_param(&self) -> bool {
        self.param.is_some()
    }

    /// Whether the node has no children.
    pub fn is_leaf(&self) -> bool {
        self.static_children.is_empty() && self.param_children.is_empty()
    }

    /// Children in matching order.
    pub fn children(&self) -> impl Iterator<Item = &RouteNode> {
        self.static_children.iter().chain(&self.param_children)
    }

    /// Heads of the static children, where a parameter value ends.
    pub fn tails(&self) -> Vec<u8> {
        self.static_children.iter().map(|c| c.head).collect()
    }

    /// Comma-separated methods of the routes at this node.
    pub fn allowed_methods(&self) -> String {
        self.routes
            .iter()
            .map(|r| r.method.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Adds a route, keeping routes sorted by method.
    pub fn add_route(&mut self, route: Route) -> AppResult<()> {
        match self
            .routes
            .binary_search_by(|r| r.method.as_str().cmp(&route.method))
        {
            Ok(_) => Err(AppError::DuplicateMethod {
                method: route.method,
                path: route.path,
            }),
            Err(idx) => {
                self.routes.insert(idx, route);
                Ok(())
            }
        }
    }

    fn push_child(&mut self, child: RouteNode) {
        let list = if child.is_param() {
            &mut self.param_children
        } else {
            &mut self.static_children
        };
        let idx = list.partition_point(|c| c.head <= child.head);
        list.insert(idx, child);
    }

    fn child_index(&self, head: u8) -> Option<(bool, usize)> {
        if let Some(idx) = self.param_children.iter().position(|c| c.head == head) {
            return Some((true, idx));
        }
        self.static_children
            .iter()
            .position(|c| c.head == head)
            .map(|idx| (false, idx))
    }

    fn child_mut(&mut self, (param, idx): (bool, usize)) -> &mut RouteNode {
        if param {
            &mut self.param_children[idx]
        } else {
            &mut self.static_children[idx]
        }
    }

    /// Visits the subtree depth first, children in matching order.
    pub fn walk<'n>(&'n self, level: usize, cb: &mut impl FnMut(usize, &'n RouteNode)) {
        cb(level, self);
        for child in self.children() {
            child.walk(level + 1, cb);
        }
    }
}

fn path_param(op: &ir::Operation, name: &str) -> AppResult<usize> {
    op.params
        .iter()
        .position(|p| p.location_in() == ParameterIn::Path && p.spec.name == name)
        .ok_or_else(|| AppError::General(format!("unknown parameter {name:?}")))
}

fn longest_prefix(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

/// Builds the chain of nodes for `path`, with `route` at its end.
fn chain(path: &str, op: &ir::Operation, route: Route) -> AppResult<RouteNode> {
    let Some((start, end, name)) = find_param(path)? else {
        let mut node = RouteNode::leaf(path);
        node.add_route(route)?;
        return Ok(node);
    };

    if start > 0 {
        let mut node = RouteNode::leaf(&path[..start]);
        node.push_child(chain(&path[start..], op, route)?);
        return Ok(node);
    }

    let mut node = RouteNode {
        param_name: name.to_string(),
        param: Some(path_param(op, name)?),
        ..RouteNode::leaf(&path[..end])
    };
    let rest = &path[end..];
    if rest.is_empty() {
        node.add_route(route)?;
    } else {
        node.push_child(chain(rest, op, route)?);
    }
    Ok(node)
}

fn insert(node: &mut RouteNode, path: &str, op: &ir::Operation, route: Route) -> AppResult<()> {
    let Some(&head) = path.as_bytes().first() else {
        return node.add_route(route);
    };
    let Some(key) = node.child_index(head) else {
        node.push_child(chain(path, op, route)?);
        return Ok(());
    };

    let child = node.child_mut(key);
    if child.is_param() {
        // Same parameter position: `/pet/{name}` and `/pet/{name}/friends`.
        let end = find_param(path)?.map_or(path.len(), |(_, end, _)| end);
        return insert(child, &path[end..], op, route);
    }

    let common = longest_prefix(path, &child.prefix);
    if common == child.prefix.len() {
        return insert(child, &path[common..], op, route);
    }

    let mut split = RouteNode::leaf(&path[..common]);
    let mut old = std::mem::take(child);
    old.prefix = old.prefix[common..].to_string();
    old.head = old.prefix.as_bytes()[0];
    split.push_child(old);

    let rest = &path[common..];
    if rest.is_empty() {
        split.add_route(route)?;
    } else {
        split.push_child(chain(rest, op, route)?);
    }
    *node.child_mut(key) = split;
    Ok(())
}

/// Route tree over the operations of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Router {
    /// Root node (empty prefix).
    pub tree: RouteNode,
    /// Largest number of path parameters of any operation.
    pub max_parameters_count: usize,
}

impl Router {
    /// Builds the tree over `ops`; routes refer to operations by index.
    pub fn build(ops: &[ir::Operation]) -> AppResult<Self> {
        let mut router = Router::default();
        for (idx, op) in ops.iter().enumerate() {
            let route = Route {
                method: op.method.clone(),
                operation: idx,
                path: op.path.clone(),
            };
            insert(&mut router.tree, &op.path, op, route)
                .map_err(|e| AppError::BuildRouter(Box::new(e)))?;
            router.max_parameters_count = router.max_parameters_count.max(op.path_params_count());
        }
        Ok(router)
    }

    /// Visits every node with its depth.
    pub fn walk<'n>(&'n self, mut cb: impl FnMut(usize, &'n RouteNode)) {
        self.tree.walk(0, &mut cb);
    }

    /// Indented listing of the tree: one node per line, parameter nodes as
    /// `:name`, routes as `METHOD Operation`.
    pub fn render(&self, ops: &[ir::Operation]) -> String {
        let mut out = String::new();
        self.walk(|level, node| {
            let indent = "  ".repeat(level);
            let label = match node.is_param() {
                true => format!(":{}", node.param_name),
                false if node.prefix.is_empty() => "<root>".to_string(),
                false => node.prefix.clone(),
            };
            let _ = write!(out, "{indent}{label}");
            for route in &node.routes {
                let name = ops.get(route.operation).map_or("?", |op| op.name.as_str());
                let _ = write!(out, " [{} {name}]", route.method);
            }
            out.push('\n');
        });
        out
    }
}

/// Webhook operations by name and method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WebhookRouter {
    /// Webhook name to method to operation index.
    pub webhooks: BTreeMap<String, BTreeMap<String, usize>>,
}

impl WebhookRouter {
    /// Indexes `webhooks` (operations carrying [`ir::WebhookInfo`]).
    pub fn build(webhooks: &[ir::Operation]) -> AppResult<Self> {
        let mut router = WebhookRouter::default();
        for (idx, op) in webhooks.iter().enumerate() {
            let Some(info) = &op.webhook else {
                continue;
            };
            let methods = router.webhooks.entry(info.name.clone()).or_default();
            if methods.insert(op.method.clone(), idx).is_some() {
                return Err(AppError::DuplicateMethod {
                    method: op.method.clone(),
                    path: info.name.clone(),
                });
            }
        }
        Ok(router)
    }
}

/// Raw text of a lowered path template, `{name}` for parameters.
pub fn path_template(op: &ir::Operation) -> String {
    op.path_parts
        .iter()
        .map(|part| match part {
            PathPart::Raw(raw) => raw.clone(),
            PathPart::Param(idx) => op
                .params
                .get(*idx)
                .map(|p| format!("{{{}}}", p.spec.name))
                .unwrap_or_default(),
        })
        .collect()
}
