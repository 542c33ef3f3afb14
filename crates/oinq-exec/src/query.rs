//! Query façade
//!
//! `Query<T>` pairs a provider with an immutable combinator chain. Every
//! combinator returns a new façade over an extended chain; nothing is
//! translated or executed until results are requested.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::NaiveDateTime;
use oinq_ir::build::{call, lambda_with, lit, source};
use oinq_ir::{DataType, Expr, Node, RecordType, Value};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::provider::{QueryError, QueryProvider, QueryResult};

/// Host types a query can yield.
pub trait Element: DeserializeOwned {
    fn data_type() -> DataType;
}

/// Host record types: the rows of a base source.
pub trait Record: Element {
    fn record_type() -> RecordType;
}

macro_rules! impl_element {
    ($($ty:ty => $data_type:expr),* $(,)?) => {
        $(
            impl Element for $ty {
                fn data_type() -> DataType {
                    $data_type
                }
            }
        )*
    };
}

impl_element!(
    bool => DataType::Bool,
    i32 => DataType::Int64,
    i64 => DataType::Int64,
    f64 => DataType::Float64,
    String => DataType::String,
    NaiveDateTime => DataType::DateTime,
);

impl<T: Element> Element for Option<T> {
    fn data_type() -> DataType {
        T::data_type()
    }
}

/// One group produced by `group_by`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Group<K, T> {
    #[serde(rename = "Key")]
    pub key: K,
    #[serde(rename = "Elements")]
    pub elements: Vec<T>,
}

impl<K: Element, T: Element> Element for Group<K, T> {
    fn data_type() -> DataType {
        DataType::grouping(K::data_type(), T::data_type())
    }
}

/// Name of the lambda parameter every combinator binds.
const ROW: &str = "r";

pub struct Query<T> {
    provider: Arc<QueryProvider>,
    chain: Expr,
    _element: PhantomData<fn() -> T>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            chain: Arc::clone(&self.chain),
            _element: PhantomData,
        }
    }
}

impl<T: Record> Query<T> {
    /// A query over every row of the provider's source.
    pub fn new(provider: Arc<QueryProvider>) -> Self {
        let chain = source(
            provider.source_name(),
            DataType::Record(T::record_type()),
        );
        Self::wrap(provider, chain)
    }
}

impl<T: Element> Query<T> {
    /// A façade over an existing chain, which must yield `T`s.
    pub fn from_chain(provider: Arc<QueryProvider>, chain: Expr) -> Result<Self, QueryError> {
        let element = chain.data_type().element_type().cloned().ok_or_else(|| {
            QueryError::Argument(format!(
                "chain of type {} is not a query",
                chain.data_type()
            ))
        })?;
        if !element.accepts(&T::data_type()) {
            return Err(QueryError::Argument(format!(
                "chain yields {element}, expected {}",
                T::data_type()
            )));
        }
        Ok(Self::wrap(provider, chain))
    }

    fn wrap(provider: Arc<QueryProvider>, chain: Expr) -> Self {
        Self {
            provider,
            chain,
            _element: PhantomData,
        }
    }

    fn extend<U>(&self, method: &str, arg: Option<Expr>, element: DataType) -> Query<U> {
        let mut args = vec![Arc::clone(&self.chain)];
        args.extend(arg);
        Query {
            provider: Arc::clone(&self.provider),
            chain: call(None, method, args, DataType::query(element)),
            _element: PhantomData,
        }
    }

    fn row_lambda(&self, body: impl FnOnce(&Expr) -> Expr) -> Expr {
        lambda_with(ROW, T::data_type(), body)
    }

    fn reduce<U>(&self, method: &str, arg: Option<Expr>, result: DataType) -> SingleQuery<U> {
        let mut args = vec![Arc::clone(&self.chain)];
        args.extend(arg);
        SingleQuery {
            provider: Arc::clone(&self.provider),
            chain: call(None, method, args, result),
            _value: PhantomData,
        }
    }

    pub fn chain(&self) -> &Expr {
        &self.chain
    }

    pub fn provider(&self) -> &Arc<QueryProvider> {
        &self.provider
    }

    pub fn filter(&self, predicate: impl FnOnce(&Expr) -> Expr) -> Query<T> {
        self.extend("Where", Some(self.row_lambda(predicate)), T::data_type())
    }

    pub fn select<U: Element>(&self, selector: impl FnOnce(&Expr) -> Expr) -> Query<U> {
        self.extend("Select", Some(self.row_lambda(selector)), U::data_type())
    }

    pub fn order_by(&self, key: impl FnOnce(&Expr) -> Expr) -> Query<T> {
        self.extend("OrderBy", Some(self.row_lambda(key)), T::data_type())
    }

    pub fn order_by_descending(&self, key: impl FnOnce(&Expr) -> Expr) -> Query<T> {
        self.extend("OrderByDescending", Some(self.row_lambda(key)), T::data_type())
    }

    pub fn then_by(&self, key: impl FnOnce(&Expr) -> Expr) -> Query<T> {
        self.extend("ThenBy", Some(self.row_lambda(key)), T::data_type())
    }

    pub fn then_by_descending(&self, key: impl FnOnce(&Expr) -> Expr) -> Query<T> {
        self.extend("ThenByDescending", Some(self.row_lambda(key)), T::data_type())
    }

    pub fn group_by<K: Element>(&self, key: impl FnOnce(&Expr) -> Expr) -> Query<Group<K, T>> {
        self.extend(
            "GroupBy",
            Some(self.row_lambda(key)),
            Group::<K, T>::data_type(),
        )
    }

    pub fn take(&self, count: u64) -> Query<T> {
        let count = i64::try_from(count).unwrap_or(i64::MAX);
        self.extend("Take", Some(lit(count)), T::data_type())
    }

    /// Any other combinator, by name. Translation fails unless the name is
    /// one the translator knows.
    pub fn apply(&self, name: &str, args: Vec<Expr>) -> Query<T> {
        let mut all = vec![Arc::clone(&self.chain)];
        all.extend(args);
        Self::wrap(
            Arc::clone(&self.provider),
            call(None, name, all, DataType::query(T::data_type())),
        )
    }

    pub fn first(&self) -> SingleQuery<T> {
        self.reduce("First", None, T::data_type())
    }

    pub fn first_where(&self, predicate: impl FnOnce(&Expr) -> Expr) -> SingleQuery<T> {
        self.reduce("First", Some(self.row_lambda(predicate)), T::data_type())
    }

    pub fn count(&self) -> SingleQuery<i64> {
        self.reduce("Count", None, DataType::Int64)
    }

    pub fn sum<U: Element>(&self, selector: impl FnOnce(&Expr) -> Expr) -> SingleQuery<U> {
        self.reduce("Sum", Some(self.row_lambda(selector)), U::data_type())
    }

    pub fn average(&self, selector: impl FnOnce(&Expr) -> Expr) -> SingleQuery<f64> {
        self.reduce("Average", Some(self.row_lambda(selector)), DataType::Float64)
    }

    pub fn min<U: Element>(&self, selector: impl FnOnce(&Expr) -> Expr) -> SingleQuery<U> {
        self.reduce("Min", Some(self.row_lambda(selector)), U::data_type())
    }

    pub fn max<U: Element>(&self, selector: impl FnOnce(&Expr) -> Expr) -> SingleQuery<U> {
        self.reduce("Max", Some(self.row_lambda(selector)), U::data_type())
    }

    /// The Pig Latin this query would run. Translates but does not execute.
    pub fn rendered_text(&self) -> Result<String, QueryError> {
        self.provider.render(&self.chain)
    }

    /// Translate, execute and decode every row.
    pub fn to_vec(&self) -> Result<Vec<T>, QueryError> {
        self.provider.execute_as(&self.chain)
    }

    /// The only element; `None` when empty, an error when there are several.
    pub fn single(&self) -> Result<Option<T>, QueryError> {
        let mut values = self.provider.execute(&self.chain)?.into_values();
        if values.len() > 1 {
            return Err(QueryError::Argument(format!(
                "sequence contains {} elements, expected at most one",
                values.len()
            )));
        }
        Ok(values.pop().map(serde_json::from_value).transpose()?)
    }
}

impl<T> fmt::Display for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.chain.as_ref() {
            Node::Constant(constant) => match (&constant.value, constant.data_type.element_type()) {
                (Value::Source(_), Some(element)) => write!(f, "Query({element})"),
                _ => write!(f, "Query(?)"),
            },
            _ => write!(f, "{}", describe(&self.chain)),
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("source", &self.provider.source_name())
            .field("chain", &describe(&self.chain))
            .finish()
    }
}

/// `people.Where.Select` style summary of a chain.
fn describe(chain: &Expr) -> String {
    match chain.as_ref() {
        Node::Constant(constant) => match &constant.value {
            Value::Source(name) => name.clone(),
            other => format!("{other:?}"),
        },
        Node::Call(call) if call.object.is_none() && !call.args.is_empty() => {
            format!("{}.{}", describe(&call.args[0]), call.method)
        }
        other => other.kind().to_string(),
    }
}

/// A chain that yields at most one value: `first` and the aggregates.
///
/// Deferred like `Query`; `expr()` lets it appear inside another query's
/// lambdas as a scalar subquery.
pub struct SingleQuery<U> {
    provider: Arc<QueryProvider>,
    chain: Expr,
    _value: PhantomData<fn() -> U>,
}

impl<U: DeserializeOwned> SingleQuery<U> {
    pub fn expr(&self) -> &Expr {
        &self.chain
    }

    pub fn rendered_text(&self) -> Result<String, QueryError> {
        self.provider.render(&self.chain)
    }

    /// Translate, execute and decode the value.
    pub fn get(&self) -> Result<Option<U>, QueryError> {
        match self.provider.execute(&self.chain)? {
            QueryResult::Single(value) => Ok(value.map(serde_json::from_value).transpose()?),
            QueryResult::Sequence(values) => Ok(values
                .into_iter()
                .next()
                .map(serde_json::from_value)
                .transpose()?),
        }
    }
}
