//! Recursive-descent parser for query text.
//!
//! Aliases are resolved while parsing: `m.team.name` and `t.name` (for
//! `join m.team t`) both become the root-relative path `team.name`.

use super::lexer::{tokenize, Spanned, Token};
use crate::ast::{ArithOp, Assignment, Expr, Operator, ParamRef, Predicate, Term};
use crate::planner::{Action, JoinSpec, QueryPlan};
use crate::projection::Projection;
use crate::sort::{Direction, Order, Sort};
use crate::statement::JoinKind;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use quarry_core::{Error, Result, Value};

const RESERVED: &[&str] = &[
    "select", "distinct", "from", "join", "left", "outer", "inner", "fetch", "where", "and",
    "or", "not", "in", "between", "like", "is", "null", "order", "by", "asc", "desc", "update",
    "set", "delete", "new", "count", "true", "false", "as",
];

static EOF: Token = Token::Eof;

/// A dotted path as written, before alias resolution.
type RawPath = Vec<String>;

enum SelectItem {
    Paths(Vec<RawPath>),
    Constructor(String, Vec<RawPath>),
    Count { distinct: bool, path: RawPath },
}

struct Parser {
    tokens: Vec<Spanned>,
    index: usize,
    root_alias: String,
    /// `(alias, relation)` for every join.
    join_aliases: Vec<(String, String)>,
}

/// Parses a select, update or delete statement into a plan skeleton.
pub fn parse_query(text: &str) -> Result<QueryPlan> {
    let mut parser = Parser {
        tokens: tokenize(text)?,
        index: 0,
        root_alias: String::new(),
        join_aliases: Vec::new(),
    };
    let plan = if parser.peek().is_keyword("select") {
        parser.select()?
    } else if parser.peek().is_keyword("update") {
        parser.update()?
    } else if parser.peek().is_keyword("delete") {
        parser.delete()?
    } else {
        return Err(parser.error("Expected select, update or delete"));
    };
    parser.expect_eof()?;
    Ok(plan)
}

impl Parser {
    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.index + offset)
            .or_else(|| self.tokens.last())
            .map_or(&EOF, |s| &s.token)
    }

    fn pos(&self) -> usize {
        self.tokens
            .get(self.index)
            .or_else(|| self.tokens.last())
            .map_or(0, |s| s.pos)
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.index < self.tokens.len() {
            self.index += 1;
        }
        token
    }

    fn error(&self, message: &str) -> Error {
        Error::descriptor(format!("{} at position {}", message, self.pos()))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_keyword(keyword) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(&format!("Expected '{}'", keyword)))
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(&format!("Expected {}", what)))
        }
    }

    fn expect_eof(&self) -> Result<()> {
        if *self.peek() == Token::Eof {
            Ok(())
        } else {
            Err(self.error("Unexpected trailing input"))
        }
    }

    fn identifier(&mut self) -> Result<String> {
        match self.peek() {
            Token::Ident(name) if !is_reserved(name) => {
                let name = name.clone();
                self.index += 1;
                Ok(name)
            }
            _ => Err(self.error("Expected identifier")),
        }
    }

    fn optional_alias(&mut self) -> Option<String> {
        self.eat_keyword("as");
        match self.peek() {
            Token::Ident(name) if !is_reserved(name) => {
                let name = name.clone();
                self.index += 1;
                Some(name)
            }
            _ => None,
        }
    }

    fn raw_path(&mut self) -> Result<RawPath> {
        let mut segments = vec![self.identifier()?];
        while self.eat(&Token::Dot) {
            segments.push(self.identifier()?);
        }
        Ok(segments)
    }

    /// Parses `Entity [as] alias`, returning the entity name.
    fn entity_clause(&mut self) -> Result<String> {
        let entity = self.identifier()?;
        self.root_alias = self.optional_alias().unwrap_or_else(|| entity.clone());
        Ok(entity)
    }

    fn select(&mut self) -> Result<QueryPlan> {
        self.expect_keyword("select")?;
        let distinct = self.eat_keyword("distinct");
        let item = self.select_item()?;
        self.expect_keyword("from")?;
        let entity = self.entity_clause()?;
        let joins = self.joins()?;
        let filter = self.where_clause()?;
        let sort = if self.eat_keyword("order") {
            self.expect_keyword("by")?;
            self.order_list()?
        } else {
            Sort::unsorted()
        };

        let mut plan = QueryPlan::select(entity).with_filter(filter).with_sort(sort);
        plan.joins = joins;
        plan.distinct = distinct;
        match item {
            SelectItem::Count { distinct, path } => {
                self.alias_or_path(&path)?;
                plan.action = Action::Count;
                plan.distinct = distinct;
            }
            SelectItem::Constructor(name, args) => {
                let args = args
                    .iter()
                    .map(|p| self.path(p))
                    .collect::<Result<Vec<_>>>()?;
                plan.projection = Projection::Constructor { name, args };
            }
            SelectItem::Paths(paths) => {
                if paths.len() == 1 {
                    if let Some(path) = self.alias_or_path(&paths[0])? {
                        plan.projection = Projection::Scalar(path);
                    }
                } else {
                    let args = paths
                        .iter()
                        .map(|p| self.path(p))
                        .collect::<Result<Vec<_>>>()?;
                    plan.projection = Projection::Constructor {
                        name: "tuple".to_string(),
                        args,
                    };
                }
            }
        }
        Ok(plan)
    }

    fn select_item(&mut self) -> Result<SelectItem> {
        if self.peek().is_keyword("count") && *self.peek_at(1) == Token::LParen {
            self.index += 2;
            let distinct = self.eat_keyword("distinct");
            let path = self.raw_path()?;
            self.expect(&Token::RParen, "')'")?;
            return Ok(SelectItem::Count { distinct, path });
        }
        if self.eat_keyword("new") {
            let mut name = self.identifier()?;
            while self.eat(&Token::Dot) {
                name = self.identifier()?;
            }
            self.expect(&Token::LParen, "'('")?;
            let args = self.path_list()?;
            self.expect(&Token::RParen, "')'")?;
            return Ok(SelectItem::Constructor(name, args));
        }
        Ok(SelectItem::Paths(self.path_list()?))
    }

    fn path_list(&mut self) -> Result<Vec<RawPath>> {
        let mut paths = vec![self.raw_path()?];
        while self.eat(&Token::Comma) {
            paths.push(self.raw_path()?);
        }
        Ok(paths)
    }

    fn joins(&mut self) -> Result<Vec<JoinSpec>> {
        let mut joins = Vec::new();
        loop {
            let kind = if self.eat_keyword("left") {
                self.eat_keyword("outer");
                self.expect_keyword("join")?;
                JoinKind::Left
            } else if self.eat_keyword("inner") {
                self.expect_keyword("join")?;
                JoinKind::Inner
            } else if self.eat_keyword("join") {
                JoinKind::Inner
            } else {
                return Ok(joins);
            };
            let fetch = self.eat_keyword("fetch");
            let path = self.raw_path()?;
            let relation = match path.as_slice() {
                [alias, relation] if *alias == self.root_alias => relation.clone(),
                _ => {
                    return Err(self.error(&format!(
                        "Join path '{}' must be <root alias>.<relation>",
                        path.join(".")
                    )))
                }
            };
            if let Some(alias) = self.optional_alias() {
                self.join_aliases.push((alias, relation.clone()));
            }
            joins.push(JoinSpec {
                relation,
                kind,
                fetch,
            });
        }
    }

    fn where_clause(&mut self) -> Result<Predicate> {
        if self.eat_keyword("where") {
            self.or_condition()
        } else {
            Ok(Predicate::no_op())
        }
    }

    fn or_condition(&mut self) -> Result<Predicate> {
        let mut left = self.and_condition()?;
        while self.eat_keyword("or") {
            let right = self.and_condition()?;
            left = left.or(&right);
        }
        Ok(left)
    }

    fn and_condition(&mut self) -> Result<Predicate> {
        let mut left = self.unary_condition()?;
        while self.eat_keyword("and") {
            let right = self.unary_condition()?;
            left = left.and(&right);
        }
        Ok(left)
    }

    fn unary_condition(&mut self) -> Result<Predicate> {
        if self.eat_keyword("not") {
            return Ok(self.unary_condition()?.negate());
        }
        if self.eat(&Token::LParen) {
            let inner = self.or_condition()?;
            self.expect(&Token::RParen, "')'")?;
            return Ok(inner);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Predicate> {
        let raw = self.raw_path()?;
        let path = self.path(&raw)?;

        if self.eat_keyword("is") {
            let negated = self.eat_keyword("not");
            self.expect_keyword("null")?;
            let op = if negated {
                Operator::IsNotNull
            } else {
                Operator::IsNull
            };
            return Ok(Predicate::leaf(path, op, Vec::new()));
        }

        let negated = self.eat_keyword("not");
        if self.eat_keyword("in") {
            let op = if negated { Operator::NotIn } else { Operator::In };
            let operands = if self.eat(&Token::LParen) {
                let mut items = vec![self.operand()?];
                while self.eat(&Token::Comma) {
                    items.push(self.operand()?);
                }
                self.expect(&Token::RParen, "')'")?;
                items
            } else {
                vec![Term::Param(self.param()?)]
            };
            return Ok(Predicate::leaf(path, op, operands));
        }
        if self.eat_keyword("between") {
            let low = self.operand()?;
            self.expect_keyword("and")?;
            let high = self.operand()?;
            let between = Predicate::leaf(path, Operator::Between, vec![low, high]);
            return Ok(if negated { between.negate() } else { between });
        }
        if self.eat_keyword("like") {
            let op = if negated {
                Operator::NotLike
            } else {
                Operator::Like
            };
            return Ok(Predicate::leaf(path, op, vec![self.operand()?]));
        }
        if negated {
            return Err(self.error("Expected in, between or like after not"));
        }

        let op = match self.bump() {
            Token::Eq => Operator::Equals,
            Token::Ne => Operator::NotEquals,
            Token::Lt => Operator::LessThan,
            Token::Le => Operator::LessThanEqual,
            Token::Gt => Operator::GreaterThan,
            Token::Ge => Operator::GreaterThanEqual,
            _ => return Err(self.error("Expected a comparison operator")),
        };
        if matches!(op, Operator::Equals | Operator::NotEquals) {
            let truth = if self.eat_keyword("true") {
                Some(true)
            } else if self.eat_keyword("false") {
                Some(false)
            } else {
                None
            };
            if let Some(truth) = truth {
                let op = if truth == (op == Operator::Equals) {
                    Operator::True
                } else {
                    Operator::False
                };
                return Ok(Predicate::leaf(path, op, Vec::new()));
            }
        }
        Ok(Predicate::leaf(path, op, vec![self.operand()?]))
    }

    fn param(&mut self) -> Result<ParamRef> {
        match self.bump() {
            Token::Named(name) => Ok(ParamRef::Named(name)),
            Token::Positional(i) => Ok(ParamRef::Positional(i)),
            _ => Err(self.error("Expected a parameter")),
        }
    }

    fn operand(&mut self) -> Result<Term> {
        match self.peek().clone() {
            Token::Named(_) | Token::Positional(_) => Ok(Term::Param(self.param()?)),
            _ => Ok(Term::Value(self.literal()?)),
        }
    }

    fn literal(&mut self) -> Result<Value> {
        let negative = self.eat(&Token::Minus);
        let value = match self.bump() {
            Token::Int(i) => Value::Int64(if negative { -i } else { i }),
            Token::Float(f) => Value::Float64(if negative { -f } else { f }),
            Token::Str(s) if !negative => Value::String(s),
            Token::Ident(s) if !negative && s.eq_ignore_ascii_case("true") => Value::Boolean(true),
            Token::Ident(s) if !negative && s.eq_ignore_ascii_case("false") => {
                Value::Boolean(false)
            }
            Token::Ident(s) if !negative && s.eq_ignore_ascii_case("null") => Value::Null,
            _ => return Err(self.error("Expected a literal")),
        };
        Ok(value)
    }

    fn order_list(&mut self) -> Result<Sort> {
        let mut orders = Vec::new();
        loop {
            let raw = self.raw_path()?;
            let property = self.path(&raw)?;
            let direction = if self.eat_keyword("desc") {
                Direction::Desc
            } else {
                self.eat_keyword("asc");
                Direction::Asc
            };
            orders.push(Order {
                property,
                direction,
                ignore_case: false,
            });
            if !self.eat(&Token::Comma) {
                return Ok(Sort::by_orders(orders));
            }
        }
    }

    fn update(&mut self) -> Result<QueryPlan> {
        self.expect_keyword("update")?;
        let entity = self.entity_clause()?;
        self.expect_keyword("set")?;
        let mut assignments = Vec::new();
        loop {
            let raw = self.raw_path()?;
            let path = self.path(&raw)?;
            self.expect(&Token::Eq, "'='")?;
            let value = self.expr()?;
            assignments.push(Assignment { path, value });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        let filter = self.where_clause()?;
        Ok(QueryPlan::select(entity)
            .with_action(Action::BulkUpdate(assignments))
            .with_filter(filter))
    }

    fn delete(&mut self) -> Result<QueryPlan> {
        self.expect_keyword("delete")?;
        self.eat_keyword("from");
        let entity = self.entity_clause()?;
        let filter = self.where_clause()?;
        Ok(QueryPlan::select(entity)
            .with_action(Action::BulkDelete)
            .with_filter(filter))
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut left = self.expr_term()?;
        loop {
            let op = if self.eat(&Token::Plus) {
                ArithOp::Add
            } else if self.eat(&Token::Minus) {
                ArithOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.expr_term()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn expr_term(&mut self) -> Result<Expr> {
        match self.peek().clone() {
            Token::LParen => {
                self.index += 1;
                let inner = self.expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::Named(_) | Token::Positional(_) => Ok(Expr::Param(self.param()?)),
            Token::Ident(name) if !is_reserved(&name) => {
                let raw = self.raw_path()?;
                Ok(Expr::Path(self.path(&raw)?))
            }
            _ => Ok(Expr::Literal(self.literal()?)),
        }
    }

    /// Resolves a written path to a root-relative attribute path.
    fn path(&self, raw: &RawPath) -> Result<String> {
        match self.alias_or_path(raw)? {
            Some(path) => Ok(path),
            None => Err(self.error(&format!(
                "'{}' names an entity where an attribute is expected",
                raw.join(".")
            ))),
        }
    }

    /// Like `path`, but a bare root alias yields `None`.
    fn alias_or_path(&self, raw: &RawPath) -> Result<Option<String>> {
        let (head, rest) = match raw.split_first() {
            Some(split) => split,
            None => return Err(self.error("Empty path")),
        };
        if *head == self.root_alias {
            return Ok(if rest.is_empty() {
                None
            } else {
                Some(rest.join("."))
            });
        }
        if let Some((_, relation)) = self.join_aliases.iter().find(|(alias, _)| alias == head) {
            if rest.is_empty() {
                return Err(self.error(&format!(
                    "Selecting joined entity '{}' is not supported",
                    head
                )));
            }
            return Ok(Some(format!("{}.{}", relation, rest.join("."))));
        }
        Err(self.error(&format!("Unknown alias '{}'", head)))
    }
}

fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::PredicateKind;

    #[test]
    fn test_select_entity_with_named_param() {
        let plan = parse_query("select m from Member m where m.username = :username").unwrap();
        assert_eq!(plan.entity, "Member");
        assert!(plan.projection.is_entity());
        assert_eq!(
            plan.filter,
            Predicate::param("username", Operator::Equals, ParamRef::Named("username".into()))
        );
    }

    #[test]
    fn test_select_scalar_and_dto() {
        let plan = parse_query("select m.username from Member m").unwrap();
        assert_eq!(plan.projection, Projection::Scalar("username".into()));

        let plan = parse_query(
            "select new study.MemberDto(m.id, m.username, t.name) from Member m join m.team t",
        )
        .unwrap();
        assert_eq!(
            plan.projection,
            Projection::constructor("MemberDto", &["id", "username", "team.name"])
        );
        assert_eq!(plan.joins[0].kind, JoinKind::Inner);
    }

    #[test]
    fn test_fetch_join() {
        let plan = parse_query("select m from Member m left join fetch m.team").unwrap();
        assert_eq!(
            plan.joins,
            vec![JoinSpec {
                relation: "team".into(),
                kind: JoinKind::Left,
                fetch: true
            }]
        );
    }

    #[test]
    fn test_where_precedence() {
        let plan =
            parse_query("select m from Member m where m.age > 10 or m.age < 5 and not m.username is null")
                .unwrap();
        match plan.filter.kind() {
            PredicateKind::Or(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[1].kind(), PredicateKind::And(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_in_between_like() {
        let plan = parse_query(
            "select m from Member m where m.username in :names and m.age between 10 and 20 and m.username not like 'a%'",
        )
        .unwrap();
        let mut ops = Vec::new();
        plan.filter.for_each_condition(&mut |c| ops.push(c.operator));
        assert_eq!(ops, vec![Operator::In, Operator::Between, Operator::NotLike]);

        let plan = parse_query("select m from Member m where m.age in (1, 2, -3)").unwrap();
        assert_eq!(plan.filter, Predicate::in_list("age", [1i64, 2, -3]));
    }

    #[test]
    fn test_count_and_order() {
        let plan = parse_query("select count(m) from Member m where m.team.name = 'teamA'").unwrap();
        assert_eq!(plan.action, Action::Count);
        assert_eq!(plan.filter, Predicate::eq("team.name", "teamA"));

        let plan = parse_query("select m from Member m order by m.age desc, m.username").unwrap();
        assert_eq!(plan.sort.orders().len(), 2);
        assert!(plan.sort.orders()[0].direction.is_descending());
    }

    #[test]
    fn test_bulk_update() {
        let plan = parse_query("update Member m set m.age = m.age + 1 where m.age >= :age").unwrap();
        match plan.action {
            Action::BulkUpdate(assignments) => {
                assert_eq!(assignments.len(), 1);
                assert_eq!(
                    assignments[0].value,
                    Expr::binary(
                        ArithOp::Add,
                        Expr::Path("age".into()),
                        Expr::Literal(Value::Int64(1))
                    )
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bulk_delete() {
        let plan = parse_query("delete from Member m where m.age < ?1").unwrap();
        assert_eq!(plan.action, Action::BulkDelete);
    }

    #[test]
    fn test_syntax_errors() {
        for text in [
            "select m from",
            "select m from Member m where",
            "select x from Member m",
            "select m from Member m join t.team x",
            "select m from Member m where m.age ~ 3",
            "select m from Member m order by",
            "merge m",
            "select m from Member m where m.age = 1 extra",
        ] {
            assert!(
                matches!(parse_query(text), Err(Error::Descriptor { .. })),
                "{}",
                text
            );
        }
    }
}
