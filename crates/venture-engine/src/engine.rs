//! `RiplEngine`: the top-level directive/inference driver.
//!
//! Modeled on the teacher's top-level `run`/`resume` entry points in
//! `asm_mcmc::kernel` plus the directive/manifest handling in
//! `asm_host::manifest`/`asm_mcmc::manifest`: a single owned [`Trace`]
//! plus a directive log, driven one instruction at a time.

use std::collections::HashMap;
use std::time::Instant;

use venture_core::{derive_substream_seed, Environment, NodeId, RngHandle, RunProvenance, SchemaVersion, Value, VentureError};
use venture_graph::canonical_hash;
use venture_kernels::{mix_mh, BlockSpec, MeanfieldOperator, MhOperator, PGibbsOperator, RejectionOperator, ScaffoldIndexer};
use venture_regen::{constrain, detach_and_extract, eval_family, list_to_vec, unconstrain, Gradients};
use venture_scaffold::{construct_scaffold, OmegaDB, Scaffold};
use venture_trace::Trace;

use crate::budget::InferBudget;
use crate::directive::{Directive, DirectiveId, DirectiveRecord};
use crate::manifest::RunManifest;
use crate::metrics::{MetricSample, MetricsRecorder};

/// The inference engine: one trace, one directive log, one RNG stream.
pub struct RiplEngine {
    trace: Trace,
    env: Environment,
    rng: RngHandle,
    master_seed: u64,
    next_directive: u64,
    log: Vec<DirectiveRecord>,
    index_of_id: HashMap<DirectiveId, usize>,
    metrics: MetricsRecorder,
    infer_steps: u64,
}

impl RiplEngine {
    /// Creates a fresh engine with the builtin library installed and seeded
    /// deterministically from `master_seed`.
    pub fn new(master_seed: u64) -> Self {
        let mut trace = Trace::new();
        let env = venture_builtins::install_builtins(&mut trace);
        Self {
            trace,
            env,
            rng: RngHandle::from_seed(derive_substream_seed(master_seed, 0)),
            master_seed,
            next_directive: 0,
            log: Vec::new(),
            index_of_id: HashMap::new(),
            metrics: MetricsRecorder::new(),
            infer_steps: 0,
        }
    }

    /// Borrows the underlying trace (for tests and diagnostics).
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Borrows the recorded per-step inference metrics.
    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    /// Reports the directive log as executed so far.
    pub fn directive_log(&self) -> &[DirectiveRecord] {
        &self.log
    }

    fn fresh_id(&mut self) -> DirectiveId {
        let id = DirectiveId(self.next_directive);
        self.next_directive += 1;
        id
    }

    fn record(&mut self, directive: Directive, root: Option<NodeId>, value: Option<Value>) -> DirectiveId {
        let id = self.fresh_id();
        self.index_of_id.insert(id, self.log.len());
        self.log.push(DirectiveRecord { directive, root, value, retracted: false });
        id
    }

    /// `assume symbol expression`: binds `symbol` to the value `expression`
    /// evaluates to, in the engine's top-level environment.
    pub fn assume(&mut self, symbol: &str, expression: &Value) -> Result<(DirectiveId, Value), VentureError> {
        let mut scaffold = Scaffold::default();
        let mut omega_db = OmegaDB::new();
        let mut gradients = Gradients::new();
        let (_, node) = eval_family(
            &mut self.trace,
            expression,
            &self.env,
            &mut scaffold,
            &mut omega_db,
            &mut gradients,
            &mut self.rng,
        )?;
        self.env = venture_core::extend_environment(&self.env, &[symbol.to_string()], &[node]);
        let value = self.value_of(node)?;
        let id = self.record(
            Directive::Assume { symbol: symbol.to_string(), expression: expression.clone() },
            Some(node),
            Some(value.clone()),
        );
        Ok((id, value))
    }

    /// `observe expression value`: evaluates `expression` and constrains
    /// its terminal random choice to `value`.
    pub fn observe(&mut self, expression: &Value, value: Value) -> Result<DirectiveId, VentureError> {
        let mut scaffold = Scaffold::default();
        let mut omega_db = OmegaDB::new();
        let mut gradients = Gradients::new();
        let (_, node) = eval_family(
            &mut self.trace,
            expression,
            &self.env,
            &mut scaffold,
            &mut omega_db,
            &mut gradients,
            &mut self.rng,
        )?;
        constrain(&mut self.trace, node, value.clone())?;
        let id = self.record(
            Directive::Observe { expression: expression.clone(), value: value.clone() },
            Some(node),
            Some(value),
        );
        Ok(id)
    }

    /// `predict expression`: evaluates `expression`, keeping the family
    /// live in the trace, and reports its value.
    pub fn predict(&mut self, expression: &Value) -> Result<(DirectiveId, Value), VentureError> {
        let mut scaffold = Scaffold::default();
        let mut omega_db = OmegaDB::new();
        let mut gradients = Gradients::new();
        let (_, node) = eval_family(
            &mut self.trace,
            expression,
            &self.env,
            &mut scaffold,
            &mut omega_db,
            &mut gradients,
            &mut self.rng,
        )?;
        let value = self.value_of(node)?;
        let id = self.record(Directive::Predict { expression: expression.clone() }, Some(node), Some(value.clone()));
        Ok((id, value))
    }

    /// `sample expression`: evaluates `expression` and reports its value
    /// without recording a directive. Unlike `predict`, there is no
    /// handle to `forget` it by; the nodes it builds remain in the trace
    /// exactly as `predict`'s would (no ephemeral-teardown machinery
    /// exists for a brush-only evaluation outside a kernel proposal),
    /// which is harmless since they are ordinary values nothing else
    /// depends on unless later expressions reference them.
    pub fn sample(&mut self, expression: &Value) -> Result<Value, VentureError> {
        let mut scaffold = Scaffold::default();
        let mut omega_db = OmegaDB::new();
        let mut gradients = Gradients::new();
        let (_, node) = eval_family(
            &mut self.trace,
            expression,
            &self.env,
            &mut scaffold,
            &mut omega_db,
            &mut gradients,
            &mut self.rng,
        )?;
        self.value_of(node)
    }

    /// `forget directive_id`: retracts a previously issued `observe` or
    /// `predict` directive whose terminal node is a random choice.
    ///
    /// `assume` directives cannot be forgotten: later directives may
    /// reference the environment binding it introduced, and there is no
    /// safe way to tear down a binding out from under its dependents.
    /// A directive rooted at a deterministic node (rather than a random
    /// choice) cannot be forgotten either, since `construct_scaffold`
    /// requires a random principal node to classify a scaffold around —
    /// this is a deliberate scope decision, not an oversight.
    pub fn forget(&mut self, id: DirectiveId) -> Result<(), VentureError> {
        let index = *self
            .index_of_id
            .get(&id)
            .ok_or_else(|| VentureError::inference("unknown-directive", format!("no such directive: {id}")))?;
        if self.log[index].retracted {
            return Err(VentureError::inference("already-forgotten", format!("directive {id} was already forgotten")));
        }
        match &self.log[index].directive {
            Directive::Assume { .. } => {
                return Err(VentureError::inference(
                    "forget-assume-unsupported",
                    "an assume directive's binding cannot be forgotten",
                ))
            }
            Directive::Observe { .. } | Directive::Predict { .. } => {}
            Directive::Forget { .. } | Directive::Infer { .. } => {
                return Err(VentureError::inference("not-forgettable", "forget and infer directives have no root to forget"))
            }
        }
        let root = self.log[index]
            .root
            .ok_or_else(|| VentureError::graph("no-root", "directive has no root node"))?;
        if !self.trace.arena().node(root)?.is_random_output() {
            return Err(VentureError::inference(
                "forget-requires-random-root",
                "only a directive rooted at a random choice can be forgotten",
            ));
        }

        let mut scaffold = construct_scaffold(&self.trace, &[vec![root]])?;
        detach_and_extract(&mut self.trace, &mut scaffold)?;
        self.log[index].retracted = true;
        Ok(())
    }

    fn value_of(&self, node: NodeId) -> Result<Value, VentureError> {
        self.trace
            .arena()
            .value(node)?
            .cloned()
            .ok_or_else(|| VentureError::graph("no-value", "node has no value"))
    }

    /// `infer expression`: parses a kernel-invocation expression and runs
    /// it against the trace, recording one metric sample per transition
    /// step, with no budget beyond what the expression itself specifies.
    pub fn infer(&mut self, expression: &Value) -> Result<(), VentureError> {
        self.infer_budgeted(expression, InferBudget::default())
    }

    /// As [`Self::infer`], but stops early once `budget` is exhausted.
    /// The budget is only ever checked between whole transition steps, so
    /// a step already in progress always finishes before returning —
    /// `infer` never leaves the trace mid-proposal.
    pub fn infer_budgeted(&mut self, expression: &Value, budget: InferBudget) -> Result<(), VentureError> {
        let plan = KernelPlan::parse(expression)?;
        let started = Instant::now();
        let mut steps_done = 0usize;
        self.run_plan(&plan, &budget, &started, &mut steps_done)
    }

    fn run_plan(&mut self, plan: &KernelPlan, budget: &InferBudget, started: &Instant, steps_done: &mut usize) -> Result<(), VentureError> {
        match plan {
            KernelPlan::Single { kernel, transitions } => {
                for _ in 0..*transitions {
                    if budget.exhausted(*steps_done, *started) {
                        return Ok(());
                    }
                    self.run_one_step(kernel)?;
                    *steps_done += 1;
                }
                Ok(())
            }
            KernelPlan::Cycle { transitions, kernels } => {
                for _ in 0..*transitions {
                    for kernel in kernels {
                        if budget.exhausted(*steps_done, *started) {
                            return Ok(());
                        }
                        self.run_one_step(kernel)?;
                        *steps_done += 1;
                    }
                }
                Ok(())
            }
            KernelPlan::Mixture { transitions, kernels } => {
                for _ in 0..*transitions {
                    if budget.exhausted(*steps_done, *started) {
                        return Ok(());
                    }
                    let index = self.rng.uniform_index(kernels.len());
                    self.run_one_step(&kernels[index])?;
                    *steps_done += 1;
                }
                Ok(())
            }
        }
    }

    fn run_one_step(&mut self, kernel: &BaseKernel) -> Result<(), VentureError> {
        let indexer = kernel.indexer();
        let accepted = match kernel {
            BaseKernel::Mh { .. } => {
                let mut operator = MhOperator::new();
                mix_mh(&mut self.trace, &indexer, &mut operator, &mut self.rng)?
            }
            BaseKernel::Rejection { .. } => {
                let mut operator = RejectionOperator::new();
                mix_mh(&mut self.trace, &indexer, &mut operator, &mut self.rng)?
            }
            BaseKernel::Meanfield { iters, step_size, .. } => {
                let mut operator = MeanfieldOperator::new(*iters, *step_size);
                mix_mh(&mut self.trace, &indexer, &mut operator, &mut self.rng)?
            }
            BaseKernel::PGibbs { particles, .. } => {
                let mut operator = PGibbsOperator::new(*particles);
                mix_mh(&mut self.trace, &indexer, &mut operator, &mut self.rng)?
            }
        };

        let trace_hash = canonical_hash(self.trace.arena())?;
        let step = self.infer_steps;
        self.infer_steps += 1;
        self.metrics.push_sample(MetricSample {
            step: step as usize,
            kernel: kernel.label(),
            accepted,
            log_alpha: 0.0,
            trace_hash,
        });
        Ok(())
    }

    /// Builds the manifest for everything executed so far.
    pub fn manifest(&self) -> Result<RunManifest, VentureError> {
        let trace_hash = canonical_hash(self.trace.arena())?;
        Ok(RunManifest {
            schema: SchemaVersion::default(),
            provenance: RunProvenance {
                trace_hash,
                seed: self.master_seed,
                seed_label: None,
                created_at: String::new(),
                tool_versions: Default::default(),
            },
            directive_log: self.log.clone(),
        })
    }
}

/// Unconstrains `node`, the inverse of [`RiplEngine::observe`]'s
/// constrain call, exposed for callers that want to revisit an
/// observation without fully forgetting it.
pub fn unconstrain_directive(trace: &mut Trace, node: NodeId) -> Result<(), VentureError> {
    unconstrain(trace, node)
}

#[derive(Debug, Clone)]
enum BaseKernel {
    Mh { scope: String, block: BlockSpec },
    Rejection { scope: String, block: BlockSpec },
    Meanfield { scope: String, block: BlockSpec, iters: usize, step_size: f64 },
    PGibbs { scope: String, block: BlockSpec, particles: usize },
}

impl BaseKernel {
    fn indexer(&self) -> ScaffoldIndexer {
        match self {
            BaseKernel::Mh { scope, block }
            | BaseKernel::Rejection { scope, block }
            | BaseKernel::Meanfield { scope, block, .. }
            | BaseKernel::PGibbs { scope, block, .. } => {
                if scope == "default" {
                    ScaffoldIndexer::default_scope()
                } else {
                    ScaffoldIndexer::scoped(scope.clone(), block.clone())
                }
            }
        }
    }

    fn label(&self) -> String {
        match self {
            BaseKernel::Mh { .. } => "mh".to_string(),
            BaseKernel::Rejection { .. } => "rejection".to_string(),
            BaseKernel::Meanfield { .. } => "meanfield".to_string(),
            BaseKernel::PGibbs { .. } => "pgibbs".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
enum KernelPlan {
    Single { kernel: BaseKernel, transitions: usize },
    Cycle { transitions: usize, kernels: Vec<BaseKernel> },
    Mixture { transitions: usize, kernels: Vec<BaseKernel> },
}

impl KernelPlan {
    fn parse(expression: &Value) -> Result<Self, VentureError> {
        let items = list_to_vec(expression)?;
        let (head, rest) = items
            .split_first()
            .ok_or_else(|| VentureError::illegal_program("empty-kernel-expression", "a kernel invocation cannot be empty"))?;
        let head = head.as_symbol()?;

        match head {
            "cycle" => {
                let (transitions, kernel_exprs) = split_transitions(rest)?;
                let kernels = kernel_exprs.iter().map(parse_base_kernel).collect::<Result<Vec<_>, _>>()?;
                Ok(KernelPlan::Cycle { transitions, kernels })
            }
            "mixture" => {
                let (transitions, kernel_exprs) = split_transitions(rest)?;
                let kernels = kernel_exprs.iter().map(parse_base_kernel).collect::<Result<Vec<_>, _>>()?;
                Ok(KernelPlan::Mixture { transitions, kernels })
            }
            _ => {
                let (kernel, transitions) = parse_base_kernel_with_transitions(head, rest)?;
                Ok(KernelPlan::Single { kernel, transitions })
            }
        }
    }
}

fn split_transitions(rest: &[Value]) -> Result<(usize, &[Value]), VentureError> {
    let (count, kernels) = rest
        .split_first()
        .ok_or_else(|| VentureError::illegal_program("cycle-arity", "cycle/mixture needs a transition count and at least one kernel"))?;
    Ok((count.as_number()? as usize, kernels))
}

fn parse_base_kernel(expression: &Value) -> Result<BaseKernel, VentureError> {
    let items = list_to_vec(expression)?;
    let (head, rest) = items
        .split_first()
        .ok_or_else(|| VentureError::illegal_program("empty-kernel-expression", "a kernel invocation cannot be empty"))?;
    let (kernel, _) = parse_base_kernel_with_transitions(head.as_symbol()?, rest)?;
    Ok(kernel)
}

fn parse_base_kernel_with_transitions(head: &str, rest: &[Value]) -> Result<(BaseKernel, usize), VentureError> {
    match head {
        "mh" => {
            let (scope, block, transitions) = scope_block_transitions(rest)?;
            Ok((BaseKernel::Mh { scope, block }, transitions))
        }
        "rejection" => {
            let (scope, block, transitions) = scope_block_transitions(rest)?;
            Ok((BaseKernel::Rejection { scope, block }, transitions))
        }
        "meanfield" => {
            let [scope, block, iters, step_size] = rest else {
                return Err(VentureError::illegal_program("meanfield-arity", "meanfield takes scope, block, iters, step_size"));
            };
            let (scope, block) = scope_and_block(scope, block)?;
            Ok((
                BaseKernel::Meanfield { scope, block, iters: iters.as_number()? as usize, step_size: step_size.as_number()? },
                1,
            ))
        }
        "pgibbs" => {
            let [scope, block, particles, t] = rest else {
                return Err(VentureError::illegal_program("pgibbs-arity", "pgibbs takes scope, block, particles, T"));
            };
            if t.as_number()? as usize != 1 {
                return Err(VentureError::inference("pgibbs-t-not-supported", "only T = 1 is supported"));
            }
            let (scope, block) = scope_and_block(scope, block)?;
            Ok((BaseKernel::PGibbs { scope, block, particles: particles.as_number()? as usize }, 1))
        }
        other => Err(VentureError::illegal_program("unknown-kernel", format!("unknown kernel invocation: {other}"))),
    }
}

fn scope_block_transitions(rest: &[Value]) -> Result<(String, BlockSpec, usize), VentureError> {
    let [scope, block, transitions] = rest else {
        return Err(VentureError::illegal_program("kernel-arity", "expected scope, block, transitions"));
    };
    let (scope, block) = scope_and_block(scope, block)?;
    Ok((scope, block, transitions.as_number()? as usize))
}

fn scope_and_block(scope: &Value, block: &Value) -> Result<(String, BlockSpec), VentureError> {
    let scope = scope.as_symbol()?.to_string();
    let block = match block.as_symbol()? {
        "one" => BlockSpec::One,
        "all" => BlockSpec::All,
        "ordered" => BlockSpec::Ordered,
        name => BlockSpec::Named(name.to_string()),
    };
    Ok((scope, block))
}
