//! Packet expressions → [`PacketDefinition`]s.
//!
//! A packet expression is a `/` composition chain of layer constructors, or
//! something that resolves to one: a helper call, a variable, a fragmentation
//! call, a subscript of any of these. Chains are flattened depth-first, left to
//! right, so layer order is exactly the source order.

use tracing::debug;

use crate::ast::{BinOp, Call, Constant, Expr};
use crate::eval::{literal_repetition, literal_value, repeat, MAX_EXPANDED_LEN};
use crate::extract::Extractor;
use crate::ir::{Fragmentation, Layer, PacketDefinition, SpecialHandling};
use crate::value::Value;

/// Shape of an expression in packet position.
#[derive(Debug)]
enum PacketNode<'m> {
    /// `lower / upper`
    Stack(&'m Expr, &'m Expr),
    /// `content * count`
    Repeat(&'m Expr),
    Call(&'m Call),
    Name(&'m str),
    Subscript { value: &'m Expr, index: &'m Expr },
    /// String or bytes payload.
    Literal(Value),
    Sequence(&'m [Expr]),
    Unhandled,
}

impl<'m> PacketNode<'m> {
    fn classify(expr: &'m Expr) -> Self {
        match expr {
            Expr::BinOp {
                left,
                op: BinOp::Div,
                right,
            } => PacketNode::Stack(left, right),
            Expr::BinOp { op: BinOp::Mult, .. } => PacketNode::Repeat(expr),
            Expr::Call(call) => PacketNode::Call(call),
            Expr::Name(name) => PacketNode::Name(name),
            Expr::Subscript { value, index } => PacketNode::Subscript { value, index },
            Expr::Constant(Constant::Str(_) | Constant::Bytes(_)) => {
                literal_value(expr).map_or(PacketNode::Unhandled, PacketNode::Literal)
            }
            Expr::List(items) | Expr::Tuple(items) => PacketNode::Sequence(items),
            _ => PacketNode::Unhandled,
        }
    }
}

impl<'m> Extractor<'m> {
    /// All packets an expression stands for.
    pub(crate) fn extract_packets(&mut self, expr: &'m Expr) -> Vec<PacketDefinition> {
        match PacketNode::classify(expr) {
            PacketNode::Stack(..) => vec![self.chain(expr)],
            PacketNode::Call(call) => match call.name() {
                Some(name) if self.config.is_fragmenter(name) => self.fragment(call, name).into_iter().collect(),
                Some(name) if self.symbols.is_helper(name) => self.inline_helper(name),
                Some(name) if self.config.is_layer(name) => self
                    .normalize_layer(call, false)
                    .map(|layer| PacketDefinition {
                        layers: vec![layer],
                        special_handling: None,
                    })
                    .into_iter()
                    .collect(),
                _ => {
                    self.diagnose(format!("unsupported packet constructor '{}'", call.func));
                    Vec::new()
                }
            },
            PacketNode::Subscript { value, index } => self.select_packets(value, index),
            PacketNode::Name(name) => {
                if self.symbols.is_helper(name) {
                    return self.inline_helper(name);
                }
                match self.symbols.binding(name) {
                    Some(bound) if self.symbols.enter_variable(name) => {
                        let packets = self.extract_packets(bound);
                        self.symbols.leave_variable(name);
                        packets
                    }
                    Some(_) => {
                        self.diagnose(format!("variable '{}' refers to itself", name));
                        Vec::new()
                    }
                    None => {
                        self.diagnose(format!("unresolved packet variable '{}'", name));
                        Vec::new()
                    }
                }
            }
            PacketNode::Sequence(items) => items.iter().flat_map(|item| self.extract_packets(item)).collect(),
            PacketNode::Repeat(_) | PacketNode::Literal(_) | PacketNode::Unhandled => {
                self.diagnose(format!("unhandled packet expression '{}'", expr));
                Vec::new()
            }
        }
    }

    /// One packet from a composition chain.
    fn chain(&mut self, expr: &'m Expr) -> PacketDefinition {
        let mut packet = PacketDefinition::default();
        self.collect_layers(expr, &mut packet);
        packet
    }

    fn collect_layers(&mut self, expr: &'m Expr, packet: &mut PacketDefinition) {
        match PacketNode::classify(expr) {
            PacketNode::Stack(lower, upper) => {
                self.collect_layers(lower, packet);
                self.collect_layers(upper, packet);
            }
            PacketNode::Repeat(expr) => {
                let layer = self.repeated_payload(expr);
                packet.layers.push(layer);
            }
            PacketNode::Call(call) => match call.name() {
                Some(name) if self.symbols.is_helper(name) => {
                    let packets = self.inline_helper(name);
                    self.splice(packets, packet);
                }
                Some(name) if self.config.is_fragmenter(name) => {
                    let packets = self.fragment(call, name).into_iter().collect();
                    self.splice(packets, packet);
                }
                _ => {
                    if let Some(layer) = self.normalize_layer(call, true) {
                        packet.layers.push(layer);
                    }
                }
            },
            PacketNode::Name(name) => {
                if self.symbols.is_helper(name) {
                    let packets = self.inline_helper(name);
                    self.splice(packets, packet);
                    return;
                }
                match self.symbols.binding(name) {
                    Some(bound) if self.symbols.enter_variable(name) => {
                        self.collect_layers(bound, packet);
                        self.symbols.leave_variable(name);
                    }
                    _ => self.diagnose(format!("unresolved name '{}' in layer chain", name)),
                }
            }
            PacketNode::Subscript { value, index } => {
                let packets = self.select_packets(value, index);
                self.splice(packets, packet);
            }
            PacketNode::Literal(content) => packet.layers.push(Layer::raw(content)),
            PacketNode::Sequence(_) | PacketNode::Unhandled => {
                self.diagnose(format!("unhandled layer expression '{}'", expr));
            }
        }
    }

    /// `"AB" * 3` as a payload layer that records the repetition. Repetitions
    /// longer than [`MAX_EXPANDED_LEN`] keep only the descriptor.
    fn repeated_payload(&mut self, expr: &'m Expr) -> Layer {
        let Some((content, count)) = literal_repetition(expr) else {
            self.diagnose(format!("payload repetition '{}' is not literal", expr));
            return Layer::raw(Value::placeholder(expr.to_string()));
        };
        let mut layer = match repeat(&content, count) {
            Some(repeated) => Layer::raw(Value::Str(repeated)),
            None => {
                self.diagnose(format!(
                    "payload repetition '{}' exceeds {} bytes and is not expanded",
                    expr, MAX_EXPANDED_LEN
                ));
                Layer::raw(Value::placeholder(expr.to_string()))
            }
        };
        layer
            .special
            .insert("payload".to_string(), SpecialHandling::StringMult { content, count });
        layer
    }

    /// Append the layers of the first packet; its fragmentation request moves
    /// to `packet` unless `packet` already has one.
    fn splice(&mut self, packets: Vec<PacketDefinition>, packet: &mut PacketDefinition) {
        let mut packets = packets.into_iter();
        let Some(first) = packets.next() else {
            return;
        };
        if packets.next().is_some() {
            self.diagnose("only the first of several packets is spliced into a layer chain");
        }
        packet.layers.extend(first.layers);
        if packet.special_handling.is_none() {
            packet.special_handling = first.special_handling;
        }
    }

    /// Packets returned by a helper, copied from the cache after the first expansion.
    fn inline_helper(&mut self, name: &'m str) -> Vec<PacketDefinition> {
        if let Some(cached) = self.symbols.cached_helper(name) {
            return cached.to_vec();
        }
        let Some(helper) = self.symbols.helper(name) else {
            return Vec::new();
        };
        if !self.symbols.enter_helper(name) {
            self.diagnose(format!("recursive helper '{}' is not inlined", name));
            return Vec::new();
        }
        let packets = match helper.returned_expr() {
            Some(returned) => self.extract_packets(returned),
            None => {
                self.diagnose(format!("helper '{}' does not return a packet", name));
                Vec::new()
            }
        };
        self.symbols.leave_helper(name);
        debug!(helper = name, packets = packets.len(), "expanded helper");
        self.symbols.cache_helper(name, packets.clone());
        packets
    }

    /// `fragment(pkt, fragSize=n)`: the base packet tagged for expansion into all fragments.
    fn fragment(&mut self, call: &'m Call, kind: &str) -> Option<PacketDefinition> {
        let Some(base) = call.args.first() else {
            self.diagnose(format!("{}() without a packet argument", kind));
            return None;
        };
        let mut packet = self.extract_packets(base).into_iter().next()?;
        let config = self.config;
        let size = call
            .keywords
            .iter()
            .rev()
            .find(|k| k.arg.as_deref().is_some_and(|arg| config.is_fragment_size_keyword(arg)))
            .map(|k| &k.value)
            .or_else(|| call.args.get(1));
        let frag_size = size.map_or(Value::None, |size| self.symbols.evaluate(size));
        packet.special_handling = Some(Fragmentation {
            kind: kind.to_string(),
            frag_size,
            fragment_index: None,
        });
        Some(packet)
    }

    /// `value[index]`: select one fragment, or one element of a packet list.
    /// Any other subscript passes the underlying packets through.
    fn select_packets(&mut self, value: &'m Expr, index: &'m Expr) -> Vec<PacketDefinition> {
        let index_value = self.symbols.evaluate(index);
        match value {
            Expr::Name(name) => {
                let Some(bound) = self.symbols.binding(name) else {
                    self.diagnose(format!("subscript of unresolved variable '{}'", name));
                    return Vec::new();
                };
                if let (Expr::List(items) | Expr::Tuple(items), Some(position)) = (bound, index_value.as_int()) {
                    let len = items.len() as i128;
                    let position = if position < 0 { position + len } else { position };
                    return match usize::try_from(position).ok().and_then(|p| items.get(p)) {
                        Some(item) => self.extract_packets(item),
                        None => {
                            self.diagnose(format!("index {} out of range for '{}'", index, name));
                            Vec::new()
                        }
                    };
                }
                if !self.symbols.enter_variable(name) {
                    self.diagnose(format!("variable '{}' refers to itself", name));
                    return Vec::new();
                }
                let mut packets = self.extract_packets(bound);
                self.symbols.leave_variable(name);
                narrow_fragment(&mut packets, index_value);
                packets
            }
            _ => {
                let mut packets = self.extract_packets(value);
                narrow_fragment(&mut packets, index_value);
                packets
            }
        }
    }
}

fn narrow_fragment(packets: &mut [PacketDefinition], index: Value) {
    if let Some(fragmentation) = packets.first_mut().and_then(|p| p.special_handling.as_mut()) {
        fragmentation.fragment_index = Some(index);
    }
}
