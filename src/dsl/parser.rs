//! The grammar and parser front end. Built from small `chumsky`
//! combinators — sub-parsers for each operator and literal glued together
//! with `.then()`/`choice()`/`.padded()`.

use chumsky::prelude::*;
use chumsky::text::whitespace;

use crate::dsl::ast::{Cmp, ColNode, ColumnTerm, DocNode, KeywordTerm, NameTerm, PercentileTerm, Term};
use crate::error::{EngineError, Span};

type Err<'src> = extra::Err<Rich<'src, char>>;

fn bool_op<'src>() -> impl Parser<'src, &'src str, crate::dsl::ast::BoolOp, Err<'src>> + Clone {
    use crate::dsl::ast::BoolOp;
    choice((
        just("AND").to(BoolOp::And),
        just("OR").to(BoolOp::Or),
        just("XOR").to(BoolOp::Xor),
    ))
}

fn cmp_op<'src>() -> impl Parser<'src, &'src str, Cmp, Err<'src>> + Clone {
    choice((
        just("ge").to(Cmp::Ge),
        just("gt").to(Cmp::Gt),
        just("le").to(Cmp::Le),
        just("lt").to(Cmp::Lt),
    ))
}

fn kw_op<'src>() -> impl Parser<'src, &'src str, (), Err<'src>> + Clone {
    choice((just("kw"), just("KW"), just("keyword"), just("KEYWORD"))).ignored()
}

fn col_op<'src>() -> impl Parser<'src, &'src str, (), Err<'src>> + Clone {
    // Longer literal first: "col" is a prefix of "column", and choice is
    // ordered, so matching "col" before "column" would swallow the first
    // three letters of "column" and leave "umn(...)" to fail downstream.
    choice((just("column"), just("COLUMN"), just("col"), just("COL"))).ignored()
}

fn name_op<'src>() -> impl Parser<'src, &'src str, (), Err<'src>> + Clone {
    choice((just("name"), just("NAME"))).ignored()
}

fn pct_op<'src>() -> impl Parser<'src, &'src str, (), Err<'src>> + Clone {
    choice((just("pp"), just("PP"), just("percentile"), just("PERCENTILE"))).ignored()
}

fn identifier<'src>() -> impl Parser<'src, &'src str, String, Err<'src>> + Clone {
    any()
        .filter(|c: &char| c.is_alphanumeric() || *c == '_' || *c == ' ')
        .repeated()
        .at_least(1)
        .collect::<String>()
        .map(|s| s.trim().to_string())
}

fn signed_number<'src>() -> impl Parser<'src, &'src str, f64, Err<'src>> + Clone {
    just('-')
        .or_not()
        .then(text::int(10))
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .try_map(|s: &str, span| {
            s.parse::<f64>()
                .map_err(|_| Rich::custom(span, format!("invalid number: {s}")))
        })
}

fn float01<'src>() -> impl Parser<'src, &'src str, f64, Err<'src>> + Clone {
    text::int(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .try_map(|s: &str, span| {
            s.parse::<f64>()
                .map_err(|_| Rich::custom(span, format!("invalid float: {s}")))
        })
}

fn int_lit<'src>() -> impl Parser<'src, &'src str, u32, Err<'src>> + Clone {
    text::int(10).try_map(|s: &str, span| {
        s.parse::<u32>()
            .map_err(|_| Rich::custom(span, format!("invalid integer: {s}")))
    })
}

/// A single Lucene-ish clause: `[("+"|"-")] [IDENTIFIER ":"] (TERM | "(" lucene_query ")")`.
/// Re-serialized verbatim (not semantically parsed) — only balanced
/// parens and the field-prefix colon matter to this crate; the payload
/// itself is opaque text handed to the full-text backend.
fn lucene_query<'src>() -> impl Parser<'src, &'src str, String, Err<'src>> {
    recursive(|lucene_query| {
        let term = none_of("():+-;")
            .repeated()
            .at_least(1)
            .collect::<String>();

        let clause = just(['+'])
            .or(just(['-']))
            .or_not()
            .then(
                identifier()
                    .then_ignore(just(':'))
                    .or_not(),
            )
            .then(choice((
                term,
                lucene_query.delimited_by(just('('), just(')')).map(|s| format!("({s})")),
            )))
            .map(|((required, field), body)| {
                let mut s = String::new();
                if let Some(r) = required {
                    s.push(r);
                }
                if let Some(f) = field {
                    s.push_str(&f);
                    s.push(':');
                }
                s.push_str(body.trim());
                s
            })
            .padded();

        clause
            .repeated()
            .at_least(1)
            .collect::<Vec<_>>()
            .map(|parts| parts.join(" "))
    })
}

fn percentile_term<'src>() -> impl Parser<'src, &'src str, PercentileTerm, Err<'src>> {
    float01()
        .then_ignore(just(';').padded())
        .then(cmp_op())
        .then_ignore(just(';').padded())
        .then(signed_number())
        .map(|((pctl, cmp), reference)| PercentileTerm {
            pctl,
            cmp,
            reference,
            annotation: None,
        })
}

/// A name-term identifier, optionally wrapped in single quotes
/// (`name('Latitude';0)`) — the quotes are stripped, not part of the name.
fn name_identifier<'src>() -> impl Parser<'src, &'src str, String, Err<'src>> + Clone {
    let quoted = identifier().delimited_by(just('\''), just('\''));
    quoted.or(identifier())
}

fn name_term<'src>() -> impl Parser<'src, &'src str, NameTerm, Err<'src>> {
    name_identifier()
        .then_ignore(just(';').padded())
        .then(int_lit())
        .map(|(name, k)| NameTerm {
            name,
            k,
            annotation: None,
        })
}

/// Builds the full recursive `query`/`column_query` grammar. Returns the
/// top-level `query` parser; `column_query` is nested inside via
/// `recursive`, mirroring the grammar's own mutual recursion.
fn query_parser<'src>() -> impl Parser<'src, &'src str, DocNode, Err<'src>> {
    recursive(|query| {
        let column_query = recursive(|column_query| {
            let columnterm = choice((
                name_op()
                    .ignore_then(name_term().delimited_by(just('('), just(')')))
                    .map(|t| ColumnTerm::Name(t)),
                pct_op()
                    .ignore_then(percentile_term().delimited_by(just('('), just(')')))
                    .map(|t| ColumnTerm::Percentile(t)),
            ))
            .map(ColNode::ColumnTerm);

            let not_col_expr = just("NOT")
                .padded()
                .ignore_then(choice((
                    columnterm.clone(),
                    column_query.clone().delimited_by(just('('), just(')')),
                )))
                .map(|inner| ColNode::NotColExpr(Box::new(inner)));

            let col_expr = choice((
                not_col_expr,
                columnterm
                    .clone()
                    .or(column_query.clone().delimited_by(just('('), just(')')))
                    .map(|inner| ColNode::ColExpr(Box::new(inner))),
            ))
            .padded();

            col_expr
                .clone()
                .then(bool_op().padded().then(column_query).or_not())
                .map(|(left, rest)| match rest {
                    Some((op, right)) => ColNode::ColumnQuery(Box::new(left), op, Box::new(right)),
                    None => left,
                })
        });

        let term = choice((
            kw_op()
                .ignore_then(whitespace())
                .ignore_then(lucene_query().delimited_by(just('('), just(')')))
                .map(|lucene| DocNode::Term(Term::Keyword(KeywordTerm::new(lucene)))),
            col_op()
                .ignore_then(whitespace())
                .ignore_then(column_query.delimited_by(just('('), just(')')))
                .map(|col| DocNode::Term(Term::Column(Box::new(col)))),
        ));

        let not_expr = just("NOT")
            .padded()
            .ignore_then(choice((
                term.clone(),
                query.clone().delimited_by(just('('), just(')')),
            )))
            .map(|inner| DocNode::NotExpr(Box::new(inner)));

        let expr = choice((
            not_expr,
            term
                .clone()
                .or(query.clone().delimited_by(just('('), just(')')))
                .map(|inner| DocNode::Expr(Box::new(inner))),
        ))
        .padded();

        expr.clone()
            .then(bool_op().padded().then(query).or_not())
            .map(|(left, rest)| match rest {
                Some((op, right)) => DocNode::Query(Box::new(left), op, Box::new(right)),
                None => left,
            })
    })
}

/// Parses DSL text into a [`DocNode`] tree, or an [`EngineError::Parse`]
/// carrying the offending line, column, and context.
pub fn parse(text: &str) -> Result<DocNode, EngineError> {
    match query_parser().padded().then_ignore(end()).parse(text).into_result() {
        Ok(tree) => Ok(tree),
        Err(errs) => {
            let e = errs.into_iter().next();
            let (context, offset) = match &e {
                Some(err) => (err.to_string(), err.span().start),
                None => ("invalid query".to_string(), 0),
            };
            let (line, column) = line_col(text, offset);
            tracing::warn!(line, column, %context, "query failed to parse");
            Err(EngineError::Parse {
                span: Span { line, column },
                context,
            })
        }
    }
}

fn line_col(text: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for c in text.chars().take(offset) {
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}
