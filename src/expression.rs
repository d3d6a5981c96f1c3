use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::iter;
use std::rc::Rc;
use std::thread::LocalKey;

use im::OrdSet;

use crate::environment::{Candidates, Environment};

/// Names of symbols and references.
pub type Name = Rc<str>;

/// A lazy sequence of substitution alternatives.
pub type Substitutions = Box<dyn Iterator<Item = Expression>>;

thread_local! {
    static NEXT_NODE_ID: Cell<u64> = Cell::new(0);
    static NEXT_FRESH_ID: Cell<u64> = Cell::new(0);
}

fn next_id(counter: &'static LocalKey<Cell<u64>>) -> u64 {
    counter.with(|next| {
        let id = next.get();
        next.set(id + 1);
        id
    })
}

/// Identifies one constructed abstraction, comprehension or scoped assertion.
/// These nodes are only ever equal to themselves.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> NodeId {
        NodeId(next_id(&NEXT_NODE_ID))
    }
}

/// Identifies one fresh value. Allocation order is increasing.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FreshId(u64);

impl FreshId {
    fn next() -> FreshId {
        FreshId(next_id(&NEXT_FRESH_ID))
    }
}

/// A one-argument function.
/// The optional pattern restricts which argument values the function accepts,
/// and any names it mentions are bound in the body alongside the parameter.
#[derive(Debug)]
pub struct Abstraction {
    id: NodeId,
    pub param: Name,
    pub pattern: Option<Expression>,
    pub body: Expression,
}

impl Abstraction {
    /// The names this abstraction binds in its body.
    pub fn binders(&self) -> BTreeSet<Name> {
        let mut names = BTreeSet::new();
        if let Some(pattern) = &self.pattern {
            pattern.collect_free_names(&mut names);
        }
        names.insert(self.param.clone());
        names
    }
}

/// Query the world with `constraint`, collect what its free names bind to, then evaluate `body`.
#[derive(Debug)]
pub struct Comprehension {
    id: NodeId,
    pub constraint: Expression,
    pub body: Expression,
}

/// Evaluate `body` in a world where `assertion` has been temporarily asserted.
#[derive(Debug)]
pub struct ScopedAssertion {
    id: NodeId,
    pub assertion: Expression,
    pub body: Expression,
}

/// An expression tree. Expressions are immutable and cheap to clone,
/// since every compound variant shares its children.
#[derive(Clone, Debug)]
pub enum Expression {
    /// An opaque named constant.
    Symbol(Name),

    /// Matches anything.
    Wildcard,

    /// One instantiation of a fresh opaque value.
    FreshValue(FreshId),

    /// Produces a new fresh value every time it is evaluated.
    FreshValueGenerator,

    /// A name resolved against the environment.
    Reference(Name),

    Abstraction(Rc<Abstraction>),

    /// Function position, then argument position.
    /// Facts are left-nested chains of these, like `(rel a) b`.
    Application(Rc<Expression>, Rc<Expression>),

    Comprehension(Rc<Comprehension>),

    ScopedAssertion(Rc<ScopedAssertion>),
}

impl Expression {
    pub fn symbol(name: &str) -> Expression {
        Expression::Symbol(name.into())
    }

    pub fn reference(name: &str) -> Expression {
        Expression::Reference(name.into())
    }

    /// Allocates a new fresh value, distinct from every one allocated before.
    pub fn fresh_value() -> Expression {
        Expression::FreshValue(FreshId::next())
    }

    pub fn apply(function: Expression, argument: Expression) -> Expression {
        Expression::Application(Rc::new(function), Rc::new(argument))
    }

    /// Builds the curried application `head arg1 arg2 ...`.
    pub fn apply_all<I>(head: Expression, args: I) -> Expression
    where
        I: IntoIterator<Item = Expression>,
    {
        args.into_iter().fold(head, Expression::apply)
    }

    pub fn abstraction(param: &str, body: Expression) -> Expression {
        Expression::abstraction_with(param.into(), None, body)
    }

    pub fn abstraction_with(param: Name, pattern: Option<Expression>, body: Expression) -> Expression {
        Expression::Abstraction(Rc::new(Abstraction {
            id: NodeId::next(),
            param,
            pattern,
            body,
        }))
    }

    pub fn comprehension(constraint: Expression, body: Expression) -> Expression {
        Expression::Comprehension(Rc::new(Comprehension {
            id: NodeId::next(),
            constraint,
            body,
        }))
    }

    pub fn scoped_assertion(assertion: Expression, body: Expression) -> Expression {
        Expression::ScopedAssertion(Rc::new(ScopedAssertion {
            id: NodeId::next(),
            assertion,
            body,
        }))
    }

    /// Atomic expressions print without parentheses in any position.
    pub fn is_atomic(&self) -> bool {
        match self {
            Expression::Symbol(_)
            | Expression::Wildcard
            | Expression::FreshValue(_)
            | Expression::FreshValueGenerator
            | Expression::Reference(_) => true,
            _ => false,
        }
    }

    // Ranks the variants for the total order.
    fn rank(&self) -> u8 {
        match self {
            Expression::Symbol(_) => 0,
            Expression::Wildcard => 1,
            Expression::FreshValue(_) => 2,
            Expression::FreshValueGenerator => 3,
            Expression::Reference(_) => 4,
            Expression::Abstraction(_) => 5,
            Expression::Application(..) => 6,
            Expression::Comprehension(_) => 7,
            Expression::ScopedAssertion(_) => 8,
        }
    }

    /// Flattens a left-nested application chain into head followed by arguments.
    /// A non-application is a spine of length one.
    pub fn spine(&self) -> Vec<Expression> {
        let mut spine = vec![];
        let mut current = self;
        while let Expression::Application(function, argument) = current {
            spine.push(argument.as_ref().clone());
            current = function;
        }
        spine.push(current.clone());
        spine.reverse();
        spine
    }

    /// Adds the names referenced but not bound within this expression.
    pub fn collect_free_names(&self, names: &mut BTreeSet<Name>) {
        match self {
            Expression::Reference(name) => {
                names.insert(name.clone());
            }
            Expression::Abstraction(abstraction) => {
                let mut inner = BTreeSet::new();
                abstraction.body.collect_free_names(&mut inner);
                let binders = abstraction.binders();
                names.extend(inner.into_iter().filter(|name| !binders.contains(name)));
            }
            Expression::Application(function, argument) => {
                function.collect_free_names(names);
                argument.collect_free_names(names);
            }
            Expression::Comprehension(comprehension) => {
                comprehension.constraint.collect_free_names(names);
                comprehension.body.collect_free_names(names);
            }
            Expression::ScopedAssertion(scoped) => {
                scoped.assertion.collect_free_names(names);
                scoped.body.collect_free_names(names);
            }
            Expression::Symbol(_)
            | Expression::Wildcard
            | Expression::FreshValue(_)
            | Expression::FreshValueGenerator => {}
        }
    }

    pub fn free_names(&self) -> BTreeSet<Name> {
        let mut names = BTreeSet::new();
        self.collect_free_names(&mut names);
        names
    }

    /// Whether substituting under this environment would change anything.
    pub fn captures(&self, env: &Environment) -> bool {
        self.free_names().iter().any(|name| env.contains(name))
    }

    /// Replaces bound references by their values.
    /// A reference bound to several candidates fans out, so compound expressions yield the
    /// Cartesian product of their parts' alternatives. Binders hide their own names first.
    pub fn substitute(&self, env: &Environment) -> Substitutions {
        match self {
            Expression::Reference(name) => match env.lookup(name) {
                Some(candidates) => Box::new(candidates.clone().into_iter()),
                None => Box::new(iter::once(self.clone())),
            },
            Expression::Application(function, argument) => {
                let arguments: Vec<Expression> = argument.substitute(env).collect();
                product(function.substitute(env), arguments, Expression::apply)
            }
            _ if !self.captures(env) => Box::new(iter::once(self.clone())),
            Expression::Abstraction(abstraction) => {
                let abstraction = rename_apart(abstraction, env);
                let inner = env.shadow(abstraction.binders());
                let param = abstraction.param.clone();
                let pattern = abstraction.pattern.clone();
                Box::new(abstraction.body.substitute(&inner).map(move |body| {
                    Expression::abstraction_with(param.clone(), pattern.clone(), body)
                }))
            }
            Expression::Comprehension(comprehension) => {
                let bodies: Vec<Expression> = comprehension.body.substitute(env).collect();
                product(
                    comprehension.constraint.substitute(env),
                    bodies,
                    Expression::comprehension,
                )
            }
            Expression::ScopedAssertion(scoped) => {
                let bodies: Vec<Expression> = scoped.body.substitute(env).collect();
                product(
                    scoped.assertion.substitute(env),
                    bodies,
                    Expression::scoped_assertion,
                )
            }
            Expression::Symbol(_)
            | Expression::Wildcard
            | Expression::FreshValue(_)
            | Expression::FreshValueGenerator => Box::new(iter::once(self.clone())),
        }
    }

    /// One-directional structural unification: `self` is the pattern, `value` the candidate.
    /// Bindings discovered along the way are added to `env`.
    /// A failed match may leave some bindings behind, so pass a clone if that matters.
    pub fn matches(&self, value: &Expression, env: &mut Environment) -> bool {
        match self {
            Expression::Symbol(name) => match value {
                Expression::Symbol(other) => name == other,
                _ => false,
            },
            Expression::Wildcard => true,
            Expression::FreshValue(_) | Expression::FreshValueGenerator => self == value,
            Expression::Reference(name) => {
                let accepts = match env.lookup(name) {
                    None => true,
                    Some(candidates) => {
                        candidates.contains(value) || candidates.contains(&Expression::Wildcard)
                    }
                };
                if accepts {
                    // Narrow the binding down to the value we matched.
                    env.bind(name.clone(), OrdSet::unit(value.clone()));
                }
                accepts
            }
            Expression::Application(function, argument) => match value {
                Expression::Application(value_function, value_argument) => {
                    function.matches(value_function, env) && argument.matches(value_argument, env)
                }
                _ => false,
            },
            Expression::Abstraction(_)
            | Expression::Comprehension(_)
            | Expression::ScopedAssertion(_) => false,
        }
    }

    /// Collects a sequence of expressions into a candidate set.
    pub fn candidates<I>(values: I) -> Candidates
    where
        I: IntoIterator<Item = Expression>,
    {
        values.into_iter().collect()
    }

    fn fmt_closed(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_atomic() {
            write!(f, "{}", self)
        } else {
            write!(f, "({})", self)
        }
    }
}

// Renames the binders of an abstraction that some value from `env` mentions freely,
// so that substituting that value into the body can't be captured by them.
fn rename_apart(abstraction: &Rc<Abstraction>, env: &Environment) -> Rc<Abstraction> {
    let binders = abstraction.binders();
    let body_names = abstraction.body.free_names();
    let mut incoming = BTreeSet::new();
    for name in body_names.iter().filter(|name| !binders.contains(*name)) {
        if let Some(candidates) = env.lookup(name) {
            for candidate in candidates {
                candidate.collect_free_names(&mut incoming);
            }
        }
    }
    let clashes: Vec<Name> = binders.intersection(&incoming).cloned().collect();
    if clashes.is_empty() {
        return abstraction.clone();
    }

    let mut avoid: BTreeSet<Name> = incoming;
    avoid.extend(body_names);
    avoid.extend(binders);
    let mut param = abstraction.param.clone();
    let mut renaming = Environment::new();
    for name in clashes {
        let fresh = fresh_name(&name, &avoid);
        avoid.insert(fresh.clone());
        if name == abstraction.param {
            param = fresh.clone();
        }
        renaming.bind(name, OrdSet::unit(Expression::Reference(fresh)));
    }

    // Every name in the renaming has exactly one candidate, so each of these yields one result.
    let pattern = abstraction.pattern.as_ref().map(|pattern| {
        pattern
            .substitute(&renaming)
            .next()
            .unwrap_or_else(|| pattern.clone())
    });
    let body = abstraction
        .body
        .substitute(&renaming)
        .next()
        .unwrap_or_else(|| abstraction.body.clone());
    Rc::new(Abstraction {
        id: NodeId::next(),
        param,
        pattern,
        body,
    })
}

// Primes the name until it is distinct from everything in `avoid`.
fn fresh_name(name: &str, avoid: &BTreeSet<Name>) -> Name {
    let mut candidate = format!("{}'", name);
    while avoid.contains(candidate.as_str()) {
        candidate.push('\'');
    }
    candidate.into()
}

// Pairs every left alternative with every right alternative.
fn product<F>(left: Substitutions, right: Vec<Expression>, combine: F) -> Substitutions
where
    F: Fn(Expression, Expression) -> Expression + Clone + 'static,
{
    Box::new(left.flat_map(move |l| {
        let combine = combine.clone();
        right
            .clone()
            .into_iter()
            .map(move |r| combine(l.clone(), r))
    }))
}

impl PartialEq for Expression {
    fn eq(&self, other: &Expression) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Expression {}

impl PartialOrd for Expression {
    fn partial_cmp(&self, other: &Expression) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Expression {
    fn cmp(&self, other: &Expression) -> Ordering {
        match (self, other) {
            (Expression::Symbol(a), Expression::Symbol(b)) => a.cmp(b),
            (Expression::FreshValue(a), Expression::FreshValue(b)) => a.cmp(b),
            (Expression::Reference(a), Expression::Reference(b)) => a.cmp(b),
            (Expression::Abstraction(a), Expression::Abstraction(b)) => a.id.cmp(&b.id),
            (Expression::Application(f1, a1), Expression::Application(f2, a2)) => {
                f1.cmp(f2).then_with(|| a1.cmp(a2))
            }
            (Expression::Comprehension(a), Expression::Comprehension(b)) => a.id.cmp(&b.id),
            (Expression::ScopedAssertion(a), Expression::ScopedAssertion(b)) => a.id.cmp(&b.id),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expression::Symbol(name) => write!(f, "{}", name),
            Expression::Wildcard => write!(f, "*"),
            Expression::FreshValue(id) => write!(f, "?{}", id.0),
            Expression::FreshValueGenerator => write!(f, "?"),
            Expression::Reference(name) => write!(f, "${}", name),
            Expression::Abstraction(abstraction) => match &abstraction.pattern {
                Some(pattern) => write!(
                    f,
                    "<{} : {}> {}",
                    abstraction.param, pattern, abstraction.body
                ),
                None => write!(f, "<{}> {}", abstraction.param, abstraction.body),
            },
            Expression::Application(function, argument) => {
                if let Expression::Application(..) = function.as_ref() {
                    write!(f, "{} ", function)?;
                } else {
                    function.fmt_closed(f)?;
                    write!(f, " ")?;
                }
                argument.fmt_closed(f)
            }
            Expression::Comprehension(comprehension) => {
                write!(f, "[{}] {}", comprehension.constraint, comprehension.body)
            }
            Expression::ScopedAssertion(scoped) => {
                write!(f, "{{{}}} {}", scoped.assertion, scoped.body)
            }
        }
    }
}
