//! Constructor call → [`Layer`].

use crate::ast::{Call, Expr};
use crate::eval::literal_repetition;
use crate::extract::Extractor;
use crate::ir::{Layer, SpecialHandling};
use crate::value::Value;

impl<'m> Extractor<'m> {
    /// Normalize one constructor call into a layer.
    ///
    /// Helper calls never produce a layer. Outside a composition chain
    /// (`known_layer == false`) the callee must also be a recognized layer
    /// constructor.
    pub(crate) fn normalize_layer(&mut self, call: &'m Call, known_layer: bool) -> Option<Layer> {
        let Some(name) = call.name() else {
            self.diagnose(format!("call to '{}' is not a layer constructor", call.func));
            return None;
        };
        if self.symbols.is_helper(name) {
            return None;
        }
        if !known_layer && !self.config.is_layer(name) {
            self.diagnose(format!("unsupported layer constructor '{}'", name));
            return None;
        }

        let mut layer = Layer::new(name);
        for keyword in &call.keywords {
            match keyword.arg.as_deref() {
                Some(key) => self.layer_param(&mut layer, key, &keyword.value),
                None => self.diagnose(format!("'**{}' in {}() is not expanded", keyword.value, name)),
            }
        }
        for (index, arg) in call.args.iter().enumerate() {
            if let Some((content, count)) = literal_repetition(arg) {
                layer
                    .special
                    .insert("payload".to_string(), SpecialHandling::StringMult { content, count });
                continue;
            }
            let value = self.symbols.evaluate(arg);
            if value.is_string_like() {
                layer.params.insert(format!("_arg{}", index), value);
            }
        }
        Some(layer)
    }

    fn layer_param(&mut self, layer: &mut Layer, key: &str, value: &'m Expr) {
        match value {
            Expr::Tuple(bounds) if bounds.len() == 2 => {
                let range = [self.symbols.evaluate(&bounds[0]), self.symbols.evaluate(&bounds[1])];
                layer
                    .special
                    .insert(key.to_string(), SpecialHandling::PortRange { range });
                return;
            }
            Expr::List(items) => {
                let values = items.iter().map(|item| self.symbols.evaluate(item)).collect();
                layer
                    .special
                    .insert(key.to_string(), SpecialHandling::ParamArray { values });
                return;
            }
            _ => {}
        }

        let evaluated = self.symbols.evaluate(value);
        if let Value::Str(text) = &evaluated {
            if let Some((address, _mask)) = text.split_once('/') {
                if self.config.is_address_key(key) {
                    layer.params.insert(key.to_string(), Value::from(address));
                    layer
                        .special
                        .insert(key.to_string(), SpecialHandling::CidrExpansion { cidr: text.clone() });
                    return;
                }
            }
        }
        layer.params.insert(key.to_string(), evaluated);
    }
}
