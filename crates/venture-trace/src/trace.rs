use std::collections::HashMap;

use venture_core::{Environment, NodeId, RngHandle, Value, VentureError};
use venture_graph::{Node, NodeArena, ScopeTag};
use venture_sp::{RequestRecord, SPAux, SP};

use crate::registry::RandomChoiceRegistry;
use crate::scope::ScopeIndex;

/// Owns a trace's node graph, the made-SP and SP-aux store for maker
/// nodes, the random-choice registry, and the scope/block index.
pub struct Trace {
    arena: NodeArena,
    made_sps: HashMap<NodeId, SP>,
    sp_auxes: HashMap<NodeId, Box<dyn SPAux>>,
    registry: RandomChoiceRegistry,
    scopes: ScopeIndex,
    request_records: HashMap<NodeId, RequestRecord>,
    families: HashMap<(NodeId, String), NodeId>,
    request_environments: HashMap<NodeId, Environment>,
}

impl Trace {
    /// Creates an empty trace.
    pub fn new() -> Self {
        Self {
            arena: NodeArena::new(),
            made_sps: HashMap::new(),
            sp_auxes: HashMap::new(),
            registry: RandomChoiceRegistry::new(),
            scopes: ScopeIndex::new(),
            request_records: HashMap::new(),
            families: HashMap::new(),
            request_environments: HashMap::new(),
        }
    }

    /// Borrows the underlying node arena.
    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    /// Mutably borrows the underlying node arena.
    pub fn arena_mut(&mut self) -> &mut NodeArena {
        &mut self.arena
    }

    /// Borrows the random-choice registry.
    pub fn registry(&self) -> &RandomChoiceRegistry {
        &self.registry
    }

    /// Mutably borrows the random-choice registry.
    pub fn registry_mut(&mut self) -> &mut RandomChoiceRegistry {
        &mut self.registry
    }

    /// Borrows the scope index.
    pub fn scopes(&self) -> &ScopeIndex {
        &self.scopes
    }

    /// Mutably borrows the scope index.
    pub fn scopes_mut(&mut self) -> &mut ScopeIndex {
        &mut self.scopes
    }

    /// Creates a constant node carrying `value`.
    pub fn create_constant_node(&mut self, value: Value) -> NodeId {
        self.arena.add_constant_node(value)
    }

    /// Creates a lookup node mirroring `source`.
    pub fn create_lookup_node(&mut self, source: NodeId) -> Result<NodeId, VentureError> {
        self.arena.add_lookup_node(source)
    }

    /// Creates a request/output pair applying `operator` to `operands`.
    pub fn create_application_nodes(
        &mut self,
        operator: NodeId,
        operands: &[NodeId],
    ) -> Result<(NodeId, NodeId), VentureError> {
        self.arena.add_application_nodes(operator, operands)
    }

    /// Tags `output` with a scope/block and records it in the scope index.
    pub fn tag_scope(&mut self, output: NodeId, scope: &str, block: &str) -> Result<(), VentureError> {
        self.arena
            .add_scope_tag(output, ScopeTag::new(scope, block))?;
        self.scopes.insert(scope, block, output);
        Ok(())
    }

    /// Installs a fresh made-SP and its aux at `maker`, replacing any
    /// previous record (used when a maker is resampled).
    pub fn install_made_sp(&mut self, maker: NodeId, sp: SP, aux: Box<dyn SPAux>) {
        self.made_sps.insert(maker, sp);
        self.sp_auxes.insert(maker, aux);
    }

    /// Removes and returns the made-SP and aux at `maker`, if any.
    pub fn uninstall_made_sp(&mut self, maker: NodeId) -> Option<(SP, Box<dyn SPAux>)> {
        let sp = self.made_sps.remove(&maker)?;
        let aux = self.sp_auxes.remove(&maker);
        aux.map(|aux| (sp, aux))
    }

    /// Borrows the made-SP installed at `maker`.
    pub fn made_sp(&self, maker: NodeId) -> Option<&SP> {
        self.made_sps.get(&maker)
    }

    /// Mutably borrows the made-SP installed at `maker`, for the
    /// mean-field operator's in-place variational-kernel parameter
    /// updates between iterations.
    pub fn made_sp_mut(&mut self, maker: NodeId) -> Option<&mut SP> {
        self.made_sps.get_mut(&maker)
    }

    /// Borrows the aux installed at `maker`.
    pub fn sp_aux(&self, maker: NodeId) -> Option<&dyn SPAux> {
        self.sp_auxes.get(&maker).map(|b| b.as_ref())
    }

    /// Mutably borrows the aux installed at `maker`.
    pub fn sp_aux_mut(&mut self, maker: NodeId) -> Option<&mut Box<dyn SPAux>> {
        self.sp_auxes.get_mut(&maker)
    }

    /// Resolves the SP applied at an output node by following its
    /// operator node's value as an `SPRef` to the installed maker.
    pub fn sp_applied_at(&self, output: NodeId) -> Result<&SP, VentureError> {
        let operator = self.operator_of(output)?;
        let operator_value = self
            .arena
            .value(operator)?
            .ok_or_else(|| VentureError::graph("no-operator-value", "operator node has no value"))?;
        let maker = operator_value.as_sp_ref()?;
        self.made_sps.get(&maker).ok_or_else(|| {
            VentureError::graph("no-made-sp", "no SP installed at the referenced maker node")
        })
    }

    /// Resolves the maker node referenced by `output`'s operator.
    pub fn maker_of(&self, output: NodeId) -> Result<NodeId, VentureError> {
        let operator = self.operator_of(output)?;
        let operator_value = self
            .arena
            .value(operator)?
            .ok_or_else(|| VentureError::graph("no-operator-value", "operator node has no value"))?;
        operator_value.as_sp_ref()
    }

    /// Borrows the made-SP and mutably borrows the aux installed at
    /// `maker`, for `incorporate`/`unincorporate` calls that need both at
    /// once. Returns `None` if no SP is installed at `maker`.
    pub fn sp_and_aux_mut(&mut self, maker: NodeId) -> Option<(&SP, &mut dyn SPAux)> {
        let sp = self.made_sps.get(&maker)?;
        let aux = self.sp_auxes.get_mut(&maker)?;
        Some((sp, &mut **aux))
    }

    /// Records the request-PSP's simulated `RequestRecord` for `node`.
    pub fn set_request_record(&mut self, node: NodeId, record: RequestRecord) {
        self.request_records.insert(node, record);
    }

    /// Borrows the request-PSP's simulated `RequestRecord` for `node`.
    pub fn request_record(&self, node: NodeId) -> Option<&RequestRecord> {
        self.request_records.get(&node)
    }

    /// Removes the request-PSP's simulated `RequestRecord` for `node`.
    pub fn clear_request_record(&mut self, node: NodeId) -> Option<RequestRecord> {
        self.request_records.remove(&node)
    }

    /// Records the lexical environment a request node's application was
    /// evaluated in, so a later re-application (resampling, or a rejected
    /// proposal's restore) resolves free variables the same way.
    pub fn set_request_environment(&mut self, request: NodeId, environment: Environment) {
        self.request_environments.insert(request, environment);
    }

    /// Borrows the lexical environment recorded for `request`.
    pub fn request_environment(&self, request: NodeId) -> Option<&Environment> {
        self.request_environments.get(&request)
    }

    /// Returns whether `request` already has a memoized family for `key`.
    pub fn has_family(&self, request: NodeId, key: &str) -> bool {
        self.families.contains_key(&(request, key.to_string()))
    }

    /// Returns the memoized family root registered for `request`/`key`.
    pub fn family(&self, request: NodeId, key: &str) -> Option<NodeId> {
        self.families.get(&(request, key.to_string())).copied()
    }

    /// Memoizes `esr_parent` as the family root for `request`/`key`.
    pub fn register_family(&mut self, request: NodeId, key: &str, esr_parent: NodeId) {
        self.families.insert((request, key.to_string()), esr_parent);
    }

    /// Removes and returns the memoized family root for `request`/`key`.
    pub fn unregister_family(&mut self, request: NodeId, key: &str) -> Option<NodeId> {
        self.families.remove(&(request, key.to_string()))
    }

    /// Lists every key and family root currently registered for `request`.
    /// Used to find exposed requests a re-simulation dropped (an `if`
    /// flipping branches, say), whose old family is now orphaned brush.
    pub fn families_for(&self, request: NodeId) -> Vec<(String, NodeId)> {
        self.families
            .iter()
            .filter(|((r, _), _)| *r == request)
            .map(|((_, key), &parent)| (key.clone(), parent))
            .collect()
    }

    /// Removes every family registration rooted at `root`, returning the
    /// `(request, key)` pairs that pointed to it. Used when a brush family
    /// is fully detached: its requester must stop remembering it.
    pub fn unregister_families_rooted_at(&mut self, root: NodeId) -> Vec<(NodeId, String)> {
        let keys: Vec<(NodeId, String)> = self
            .families
            .iter()
            .filter(|(_, &parent)| parent == root)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            self.families.remove(key);
        }
        keys
    }

    /// Returns the currently incorporated operand values of `output`.
    pub fn operand_values(&self, output: NodeId) -> Result<Vec<Value>, VentureError> {
        let (_, operands, ..) = self.output_fields(output)?;
        operands
            .iter()
            .map(|operand| {
                self.arena
                    .value(*operand)?
                    .cloned()
                    .ok_or_else(|| VentureError::graph("no-operand-value", "operand node has no value"))
            })
            .collect()
    }

    /// Registers `node` in the random-choice registry.
    pub fn register_random(&mut self, node: NodeId) {
        self.registry.insert(node);
    }

    /// Removes `node` from the random-choice registry.
    pub fn unregister_random(&mut self, node: NodeId) {
        self.registry.remove(node);
    }

    /// Samples a principal node uniformly from the random-choice registry.
    pub fn sample_principal_node(&self, rng: &mut RngHandle) -> Result<NodeId, VentureError> {
        self.registry.sample_uniform(rng)
    }

    /// Samples a block uniformly within `scope`, returning its member nodes.
    pub fn sample_block(&self, scope: &str, rng: &mut RngHandle) -> Result<Vec<NodeId>, VentureError> {
        self.scopes.sample_block(scope, rng)
    }

    /// Returns `logDensity(currentValue | currentOperands)` for `node`.
    pub fn log_density_of_principal_node(&self, node: NodeId) -> Result<f64, VentureError> {
        let value = self
            .arena
            .value(node)?
            .cloned()
            .ok_or_else(|| VentureError::graph("no-value", "node has no current value"))?;
        let operands = self.operand_values(node)?;
        let sp = self.sp_applied_at(node)?;
        let aux = self.maker_aux_for(node)?;
        sp.output_psp.log_density(&value, &operands, aux)
    }

    /// Sums `log_density_of_principal_node` over `nodes`.
    pub fn log_density_of_block(&self, nodes: &[NodeId]) -> Result<f64, VentureError> {
        let mut total = 0.0;
        for node in nodes {
            total += self.log_density_of_principal_node(*node)?;
        }
        Ok(total)
    }

    fn operator_of(&self, output: NodeId) -> Result<NodeId, VentureError> {
        match self.arena.node(output)? {
            Node::Output { operator, .. } => Ok(*operator),
            _ => Err(VentureError::graph("not-an-output-node", "node is not an output node")),
        }
    }

    fn output_fields(&self, output: NodeId) -> Result<(NodeId, &[NodeId], NodeId), VentureError> {
        match self.arena.node(output)? {
            Node::Output {
                operator,
                operands,
                request,
                ..
            } => Ok((*operator, operands.as_slice(), *request)),
            _ => Err(VentureError::graph("not-an-output-node", "node is not an output node")),
        }
    }

    fn maker_aux_for(&self, output: NodeId) -> Result<Option<&dyn SPAux>, VentureError> {
        let operator = self.operator_of(output)?;
        let operator_value = self.arena.value(operator)?;
        let maker = match operator_value {
            Some(value) => value.as_sp_ref().ok(),
            None => None,
        };
        Ok(maker.and_then(|maker| self.sp_aux(maker)))
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use venture_sp::{NullRequestPSP, OutputPSP, UnitAux};

    #[derive(Debug)]
    struct ConstPsp(f64);

    impl OutputPSP for ConstPsp {
        fn simulate(
            &self,
            _operands: &[Value],
            _aux: Option<&dyn SPAux>,
            _rng: &mut RngHandle,
        ) -> Result<Value, VentureError> {
            Ok(Value::Number(self.0))
        }

        fn log_density(
            &self,
            value: &Value,
            _operands: &[Value],
            _aux: Option<&dyn SPAux>,
        ) -> Result<f64, VentureError> {
            Ok(if value.as_number()? == self.0 { 0.0 } else { f64::NEG_INFINITY })
        }

        fn incorporate(&self, _v: &Value, _o: &[Value], _a: &mut dyn SPAux) -> Result<(), VentureError> {
            Ok(())
        }

        fn unincorporate(&self, _v: &Value, _o: &[Value], _a: &mut dyn SPAux) -> Result<(), VentureError> {
            Ok(())
        }

        fn is_random(&self) -> bool {
            true
        }
    }

    #[test]
    fn log_density_resolves_through_operator_sp_ref() {
        let mut trace = Trace::new();
        let maker = trace.create_constant_node(Value::Nil);
        let sp = SP::new(Box::new(NullRequestPSP), Box::new(ConstPsp(7.0)), || {
            Box::new(UnitAux) as Box<dyn SPAux>
        });
        trace.install_made_sp(maker, sp, Box::new(UnitAux));

        let operator = trace.create_constant_node(Value::SPRef(maker));
        let (_, output) = trace.create_application_nodes(operator, &[]).unwrap();
        trace.arena_mut().set_value(output, Value::Number(7.0)).unwrap();

        assert_eq!(trace.log_density_of_principal_node(output).unwrap(), 0.0);
    }

    #[test]
    fn principal_node_sampling_uses_registry() {
        let mut trace = Trace::new();
        let node = trace.create_constant_node(Value::Number(1.0));
        trace.register_random(node);
        let mut rng = RngHandle::from_seed(0);
        assert_eq!(trace.sample_principal_node(&mut rng).unwrap(), node);
    }
}
