// src/registry.rs

//! Node type registry.
//!
//! A plain value passed to whoever needs to create nodes (config assembly,
//! tests). There is no process-wide instance.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::dag::{NodeDescriptor, PinLayout};
use crate::errors::{NodeforgeError, Result};
use crate::exec::NodeImplementation;
use crate::nodes::{
    BlendMode, BlendNode, ConstantNode, GradientAxis, GradientNode, InvertNode, LevelsNode,
    NoiseNode,
};
use crate::types::NodeCategory;

/// What a factory produces: everything about a node except its name.
#[derive(Debug, Clone)]
pub struct NodeTemplate {
    pub category: NodeCategory,
    pub pins: PinLayout,
    pub implementation: Arc<dyn NodeImplementation>,
}

type Factory = Box<dyn Fn(&mut Params<'_>) -> Result<NodeTemplate> + Send + Sync>;

#[derive(Default)]
pub struct NodeRegistry {
    factories: BTreeMap<String, Factory>,
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl NodeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every node type in [`crate::nodes`].
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register("constant", |p| {
            let value = p.f32_or("value", 0.0)?;
            Ok(template(
                NodeCategory::Generator,
                ConstantNode::pins(),
                ConstantNode::new(value),
            ))
        });

        registry.register("gradient", |p| {
            let axis = match p.str_or("axis", "horizontal")? {
                "horizontal" => GradientAxis::Horizontal,
                "vertical" => GradientAxis::Vertical,
                "radial" => GradientAxis::Radial,
                other => {
                    return Err(NodeforgeError::ConfigError(format!(
                        "invalid gradient axis '{other}' (expected horizontal, vertical or radial)"
                    )));
                }
            };
            Ok(template(
                NodeCategory::Generator,
                GradientNode::pins(),
                GradientNode::new(axis),
            ))
        });

        registry.register("noise", |p| {
            let seed = p.u64_or("seed", 0)?;
            let frequency = p.f32_or("frequency", 4.0)?;
            let octaves = p.u64_or("octaves", 4)? as u32;
            Ok(template(
                NodeCategory::Generator,
                NoiseNode::pins(),
                NoiseNode::new(seed, frequency, octaves),
            ))
        });

        registry.register("invert", |_| {
            Ok(template(
                NodeCategory::Filter,
                InvertNode::pins(),
                InvertNode::new(),
            ))
        });

        registry.register("levels", |p| {
            let low = p.f32_or("low", 0.0)?;
            let high = p.f32_or("high", 1.0)?;
            Ok(template(
                NodeCategory::Filter,
                LevelsNode::pins(),
                LevelsNode::new(low, high),
            ))
        });

        registry.register("blend", |p| {
            let mode: BlendMode = p
                .str_or("mode", "mix")?
                .parse()
                .map_err(NodeforgeError::ConfigError)?;
            let factor = p.f32_or("factor", 1.0)?;
            Ok(template(
                NodeCategory::Combiner,
                BlendNode::pins(),
                BlendNode::new(mode, factor),
            ))
        });

        registry
    }

    /// Register (or replace) the factory for `type_name`.
    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F)
    where
        F: Fn(&mut Params<'_>) -> Result<NodeTemplate> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        debug!(type_name = %type_name, "registering node type");
        self.factories.insert(type_name, Box::new(factory));
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Instantiate a node of `type_name` called `name`.
    ///
    /// Every key in `params` must be consumed by the factory; leftovers are
    /// reported as a config error naming the node.
    pub fn create(
        &self,
        type_name: &str,
        name: &str,
        params: &toml::Table,
    ) -> Result<NodeDescriptor> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| NodeforgeError::UnknownNodeType(type_name.to_string()))?;

        let mut reader = Params::new(name, params);
        let template = factory(&mut reader)?;
        reader.finish()?;

        Ok(NodeDescriptor {
            name: name.to_string(),
            category: template.category,
            pins: template.pins,
            implementation: template.implementation,
        })
    }
}

fn template<N>(category: NodeCategory, pins: PinLayout, node: N) -> NodeTemplate
where
    N: NodeImplementation + 'static,
{
    NodeTemplate {
        category,
        pins,
        implementation: Arc::new(node),
    }
}

/// Typed access to a node's parameter table, tracking which keys were read.
pub struct Params<'a> {
    node: &'a str,
    table: &'a toml::Table,
    used: BTreeSet<&'a str>,
}

impl<'a> Params<'a> {
    pub fn new(node: &'a str, table: &'a toml::Table) -> Self {
        Self {
            node,
            table,
            used: BTreeSet::new(),
        }
    }

    fn take(&mut self, key: &'a str) -> Option<&'a toml::Value> {
        self.used.insert(key);
        self.table.get(key)
    }

    fn invalid(&self, key: &str, expected: &str) -> NodeforgeError {
        NodeforgeError::ConfigError(format!(
            "node '{}': parameter '{key}' must be {expected}",
            self.node
        ))
    }

    pub fn f32_or(&mut self, key: &'a str, default: f32) -> Result<f32> {
        match self.take(key) {
            None => Ok(default),
            Some(toml::Value::Float(v)) => Ok(*v as f32),
            Some(toml::Value::Integer(v)) => Ok(*v as f32),
            Some(_) => Err(self.invalid(key, "a number")),
        }
    }

    pub fn u64_or(&mut self, key: &'a str, default: u64) -> Result<u64> {
        match self.take(key) {
            None => Ok(default),
            Some(toml::Value::Integer(v)) if *v >= 0 => Ok(*v as u64),
            Some(_) => Err(self.invalid(key, "a non-negative integer")),
        }
    }

    pub fn str_or(&mut self, key: &'a str, default: &'a str) -> Result<&'a str> {
        match self.take(key) {
            None => Ok(default),
            Some(toml::Value::String(s)) => Ok(s.as_str()),
            Some(_) => Err(self.invalid(key, "a string")),
        }
    }

    /// Fail if the table holds keys no accessor asked for.
    pub fn finish(self) -> Result<()> {
        let unknown: Vec<&str> = self
            .table
            .keys()
            .map(String::as_str)
            .filter(|k| !self.used.contains(k))
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(NodeforgeError::ConfigError(format!(
                "node '{}': unknown parameter(s) {:?}",
                self.node, unknown
            )))
        }
    }
}
