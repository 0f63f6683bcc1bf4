use super::{UcErrorMode, UcFind, UcReader, UcReaderOptions, UcSyncReader};
use crate::decode::{decode_uc_primitive, decode_uc_text, UcPrimitive};
use crate::error::{format_uc_path, Result, UcError, UcPathStep, UcrxRejection};
use crate::rx::{
    OpaqueUcrx, UcValueRx, Ucrx, UcrxContext, UcrxHandle, UcrxKeyTarget, UcrxOutcome, UcrxPush,
};
use crate::token::{print_uc_tokens, UcInsetId, UcToken};
use crate::value::UcValue;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use tracing::trace;

/// Prefix of formatted values, `!format'name(data)`
const FORMAT_PREFIX: &str = "!format'";

/// Significant token ahead, blanks skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookahead {
    End,
    Open,
    Close,
    Comma,
    Bang,
    Quote,
    Dollar,
    /// Text or a reserved character without structural meaning
    Word,
    InsetStart(UcInsetId),
    InsetEnd,
}

/// Classifies a token; `None` for padding and line terminators
fn classify(token: &UcToken) -> Option<Lookahead> {
    Some(match token {
        UcToken::Text(_) => Lookahead::Word,
        UcToken::Reserved(b'(') => Lookahead::Open,
        UcToken::Reserved(b')') => Lookahead::Close,
        UcToken::Reserved(b',') => Lookahead::Comma,
        UcToken::Reserved(b'!') => Lookahead::Bang,
        UcToken::Reserved(b'\'') => Lookahead::Quote,
        UcToken::Reserved(b'$') => Lookahead::Dollar,
        UcToken::Reserved(_) => Lookahead::Word,
        UcToken::Padding { .. } | UcToken::LineEnd(_) => return None,
        UcToken::InsetStart(id) => Lookahead::InsetStart(*id),
        UcToken::InsetEnd(_) => Lookahead::InsetEnd,
    })
}

fn ends_word(token: &UcToken) -> bool {
    matches!(
        token,
        UcToken::Reserved(b'(' | b')' | b',')
            | UcToken::LineEnd(_)
            | UcToken::InsetStart(_)
            | UcToken::InsetEnd(_)
    )
}

fn ends_entity(token: &UcToken) -> bool {
    ends_word(token) || matches!(token, UcToken::Padding { .. })
}

/// Raw value span: up to `,` or an unbalanced `)`, a line end, or an inset marker
fn raw_span() -> impl FnMut(&UcToken) -> UcFind {
    let mut depth = 0usize;
    move |token| match token {
        UcToken::Reserved(b'(') => {
            depth += 1;
            UcFind::Undecided
        }
        UcToken::Reserved(b')') if depth == 0 => UcFind::Reject,
        UcToken::Reserved(b')') => {
            depth -= 1;
            UcFind::Undecided
        }
        UcToken::Reserved(b',') if depth == 0 => UcFind::Reject,
        UcToken::LineEnd(_) | UcToken::InsetStart(_) | UcToken::InsetEnd(_) => UcFind::Reject,
        _ => UcFind::Undecided,
    }
}

/// Recovery span: everything up to `,` or an unbalanced `)`
fn garbage_span() -> impl FnMut(&UcToken) -> UcFind {
    let mut depth = 0usize;
    move |token| match token {
        UcToken::Reserved(b'(') => {
            depth += 1;
            UcFind::Undecided
        }
        UcToken::Reserved(b')' | b',') if depth == 0 => UcFind::Reject,
        UcToken::Reserved(b')') => {
            depth -= 1;
            UcFind::Undecided
        }
        _ => UcFind::Undecided,
    }
}

/// Arguments span: up to the `)` matching an already read `(`
fn args_span() -> impl FnMut(&UcToken) -> UcFind {
    let mut depth = 0usize;
    move |token| match token {
        UcToken::Reserved(b'(') => {
            depth += 1;
            UcFind::Undecided
        }
        UcToken::Reserved(b')') if depth == 0 => UcFind::Accept,
        UcToken::Reserved(b')') => {
            depth -= 1;
            UcFind::Undecided
        }
        _ => UcFind::Undecided,
    }
}

fn trim_blanks(tokens: &mut Vec<UcToken>) {
    while tokens.last().is_some_and(UcToken::is_blank) {
        tokens.pop();
    }
}

fn unexpected_token(token: &UcToken) -> UcrxRejection {
    let text = token.to_string();
    if text.is_empty() {
        UcrxRejection::invalid_syntax(format!("Unexpected {}", token.type_name()))
    } else {
        UcrxRejection::invalid_syntax(format!("Unexpected {} `{}`", token.type_name(), text))
    }
}

/// URI Charge grammar driver
///
/// Reads one document from a [`UcReader`] and pushes it into a [`Ucrx`].
/// Rejections raised by receivers are funneled through
/// [`UcReader::error`] after every item, so in [`UcErrorMode::Collect`] mode
/// parsing goes on with rejected subtrees routed into [`OpaqueUcrx`].
pub struct UcParser<'o, R> {
    reader: R,
    options: &'o UcReaderOptions,
    cx: UcrxContext,
    depth: usize,
}

impl<'o, R: UcReader> UcParser<'o, R> {
    pub fn new(reader: R, options: &'o UcReaderOptions) -> Self {
        Self {
            reader,
            options,
            cx: UcrxContext::new(),
            depth: 0,
        }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_reader(self) -> R {
        self.reader
    }

    pub fn context(&self) -> &UcrxContext {
        &self.cx
    }

    /// Reads a whole document
    pub async fn parse(&mut self, rx: &mut dyn Ucrx) -> Result<()> {
        self.read_items(rx, false).await?;

        // Only an unbalanced `)` stops the top-level items
        if self.lookahead().await? != Lookahead::End {
            self.reject_next().await?;
        }
        Ok(())
    }

    /// Reads an inset whose start marker is the current token
    ///
    /// The inset is re-lexed by the lexer registered for `id`, if any. With
    /// `single`, a top-level comma ends the value instead of making a list.
    pub async fn read_inset(&mut self, rx: &mut dyn Ucrx, id: UcInsetId, single: bool) -> Result<()> {
        let lexer = self.options.insets.get(&id).map(|factory| factory());
        trace!(inset = id, relexed = lexer.is_some(), "reading inset");

        self.reader.begin_inset(id, lexer).await?;
        self.read_items(rx, single).await?;
        if self.lookahead().await? != Lookahead::End {
            self.reject_next().await?;
        }
        self.reader.end_inset().await
    }

    /// Reads comma-separated items into a context that may become a list
    fn read_items<'a>(
        &'a mut self,
        rx: &'a mut dyn Ucrx,
        single: bool,
    ) -> LocalBoxFuture<'a, Result<()>> {
        async move {
            self.enter_level()?;
            let mut handle = UcrxHandle::new(rx);

            'items: loop {
                let item_rx = handle.item(&mut self.cx);
                self.read_item(item_rx).await?;
                handle.leave_item(&mut self.cx);
                self.flush_rejections()?;

                loop {
                    match self.lookahead().await? {
                        Lookahead::End | Lookahead::Close => break 'items,
                        Lookahead::Comma if single => break 'items,
                        Lookahead::Comma => {
                            self.reader.next().await?;
                            self.reader.skip();
                            handle.separator(&mut self.cx);
                            self.flush_rejections()?;

                            // Trailing comma
                            match self.lookahead().await? {
                                Lookahead::End | Lookahead::Close => break 'items,
                                _ => continue 'items,
                            }
                        }
                        _ => self.skip_unexpected().await?,
                    }
                }
            }

            handle.close(&mut self.cx);
            self.flush_rejections()?;
            self.depth -= 1;
            Ok(())
        }
        .boxed_local()
    }

    async fn read_item(&mut self, rx: &mut dyn Ucrx) -> Result<()> {
        match self.lookahead().await? {
            Lookahead::End | Lookahead::Close | Lookahead::Comma => {
                rx.push_string("", &mut self.cx);
            }
            Lookahead::InsetStart(id) => {
                self.reader.next().await?;
                self.read_inset(rx, id, false).await?;
            }
            Lookahead::InsetEnd => self.skip_unexpected().await?,
            Lookahead::Open => self.read_list(rx).await?,
            Lookahead::Bang => self.read_entity(rx).await?,
            Lookahead::Quote => self.read_quoted(rx).await?,
            Lookahead::Dollar => self.read_dollar_map(rx).await?,
            Lookahead::Word => {
                let word = self.read_word().await?;
                if self.lookahead().await? == Lookahead::Open {
                    self.read_map(rx, word).await?;
                } else {
                    match decode_uc_text(&word) {
                        Ok(primitive) => self.push_primitive(rx, primitive),
                        Err(rejection) => {
                            self.cx.reject(rejection);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// `(a)(b)...`: one list item per group
    async fn read_list(&mut self, rx: &mut dyn Ucrx) -> Result<()> {
        let mut handle = UcrxHandle::new(rx);
        handle.begin_list(&mut self.cx);
        self.flush_rejections()?;

        while self.lookahead().await? == Lookahead::Open {
            self.reader.next().await?;
            let item_rx = handle.item(&mut self.cx);
            let closed = self.read_group(item_rx).await?;
            handle.leave_item(&mut self.cx);
            self.flush_rejections()?;
            if !closed {
                break;
            }
        }

        handle.close(&mut self.cx);
        self.flush_rejections()
    }

    /// Reads the items of a group whose `(` was read, then its `)`
    ///
    /// Returns false for an unterminated group.
    async fn read_group(&mut self, rx: &mut dyn Ucrx) -> Result<bool> {
        self.read_items(rx, false).await?;

        if self.lookahead().await? == Lookahead::Close {
            self.reader.next().await?;
            self.reader.skip();
            Ok(true)
        } else {
            self.cx
                .reject(UcrxRejection::invalid_syntax("Unterminated group"));
            Ok(false)
        }
    }

    /// `$`, `$key`, `$key(value)...`
    async fn read_dollar_map(&mut self, rx: &mut dyn Ucrx) -> Result<()> {
        self.reader.next().await?;
        self.reader.skip();

        match self.lookahead().await? {
            Lookahead::Open => self.read_map(rx, String::new()).await,
            Lookahead::Word | Lookahead::Bang | Lookahead::Quote | Lookahead::Dollar => {
                let key = self.read_word().await?;
                self.read_map(rx, key).await
            }
            _ => {
                rx.push_map_end(&mut self.cx);
                self.flush_rejections()
            }
        }
    }

    /// Map entries, starting with an already read key
    async fn read_map(&mut self, rx: &mut dyn Ucrx, first_key: String) -> Result<()> {
        let mut opaque = OpaqueUcrx;
        let mut not_map = false;
        let mut key = first_key;

        loop {
            self.cx.enter(UcPathStep::Key(key.clone()));
            let target = if not_map {
                UcrxKeyTarget::Skip
            } else {
                rx.enter_key(&key, &mut self.cx)
            };
            let has_value = match target {
                UcrxKeyTarget::Entry(entry_rx) => self.read_entry(entry_rx).await?,
                UcrxKeyTarget::Skip => self.read_entry(&mut opaque).await?,
                UcrxKeyTarget::NotMap => {
                    not_map = true;
                    self.read_entry(&mut opaque).await?
                }
            };
            self.cx.leave();
            self.flush_rejections()?;

            // A bare key ends the map
            if !has_value {
                break;
            }

            key = match self.lookahead().await? {
                Lookahead::Word => self.read_word().await?,
                Lookahead::Dollar => {
                    self.reader.next().await?;
                    self.reader.skip();
                    self.read_word().await?
                }
                _ => break,
            };
        }

        if !not_map {
            rx.push_map_end(&mut self.cx);
        }
        self.flush_rejections()
    }

    /// Entry value: one group is the value, more groups make a list
    ///
    /// Returns false for a bare key, which is given the empty string.
    async fn read_entry(&mut self, rx: &mut dyn Ucrx) -> Result<bool> {
        if self.lookahead().await? != Lookahead::Open {
            rx.push_string("", &mut self.cx);
            return Ok(false);
        }

        let mut handle = UcrxHandle::new(rx);
        while self.lookahead().await? == Lookahead::Open {
            self.reader.next().await?;
            let item_rx = handle.item(&mut self.cx);
            let closed = self.read_group(item_rx).await?;
            handle.leave_item(&mut self.cx);
            self.flush_rejections()?;
            if !closed {
                break;
            }
        }

        handle.close(&mut self.cx);
        Ok(true)
    }

    /// `!...`: booleans, empty lists, entities, directives and formats
    async fn read_entity(&mut self, rx: &mut dyn Ucrx) -> Result<()> {
        self.reader.skip();
        self.reader.next().await?;
        self.reader
            .find(|token| {
                if ends_entity(token) {
                    UcFind::Reject
                } else {
                    UcFind::Undecided
                }
            })
            .await?;
        let text = print_uc_tokens(&self.reader.consume());

        if self.lookahead().await? == Lookahead::Open {
            return match text.strip_prefix(FORMAT_PREFIX) {
                Some(format) => self.read_format(rx, format).await,
                None => self.read_directive(rx, &text).await,
            };
        }

        match decode_uc_primitive(&text) {
            Ok(primitive) => self.push_primitive(rx, primitive),
            Err(rejection) => {
                self.cx.reject(rejection);
            }
        }
        Ok(())
    }

    /// `!format'name(data)`
    async fn read_format(&mut self, rx: &mut dyn Ucrx, format: &str) -> Result<()> {
        let data = print_uc_tokens(&self.read_args().await?);
        let options = self.options;

        let outcome = match options.extensions.format(format) {
            Some(handler) => handler.handle(rx, &mut self.cx, &data),
            None => UcrxOutcome::Unsupported,
        };
        if outcome == UcrxOutcome::Unsupported {
            rx.push_format(format, &data, &mut self.cx);
        }
        self.flush_rejections()
    }

    /// `!name(args)value`
    ///
    /// Registered directives get their arguments parsed as charge and the raw
    /// trailing value. Anything else is an entity spelled with parentheses.
    async fn read_directive(&mut self, rx: &mut dyn Ucrx, name: &str) -> Result<()> {
        let args = self.read_args().await?;
        let args_text = print_uc_tokens(&args);
        let value = print_uc_tokens(&self.read_raw().await?);
        let options = self.options;

        if let Some(handler) = options.extensions.directive(name) {
            trace!(directive = name, "handling directive");
            let args = self.parse_args(args).await?;
            let outcome = handler.handle(rx, &mut self.cx, &args, &value);
            if outcome != UcrxOutcome::Unsupported {
                return self.flush_rejections();
            }
        }

        let entity = format!("{}({}){}", name, args_text, value);
        self.push_entity(rx, &entity);
        self.flush_rejections()
    }

    /// Parses directive arguments, forwarding their rejections
    async fn parse_args(&mut self, tokens: Vec<UcToken>) -> Result<UcValue> {
        let reader = UcSyncReader::new(tokens).with_error_mode(UcErrorMode::Collect);
        let mut parser = UcParser {
            reader,
            options: self.options,
            cx: UcrxContext::new(),
            depth: self.depth,
        };
        let mut args = UcValueRx::new();
        parser.parse(&mut args).await?;

        for rejection in parser.reader.take_rejections() {
            let mut path = self.cx.path().to_vec();
            path.extend(rejection.path.iter().cloned());
            self.reader.error(rejection.at(&path))?;
        }
        Ok(args.into_value().unwrap_or_else(|| UcValue::from("")))
    }

    /// Reads `(...)`, returning the tokens between the parentheses
    async fn read_args(&mut self) -> Result<Vec<UcToken>> {
        self.reader.next().await?;
        self.reader.skip();

        if self.reader.find(args_span()).await?.is_some() {
            let args = self.reader.consume_prev();
            self.reader.skip();
            Ok(args)
        } else {
            self.cx
                .reject(UcrxRejection::invalid_syntax("Unterminated arguments"));
            Ok(self.reader.consume())
        }
    }

    /// `'...`: the raw span after the quote, as is
    async fn read_quoted(&mut self, rx: &mut dyn Ucrx) -> Result<()> {
        self.reader.next().await?;
        let text = print_uc_tokens(&self.read_raw().await?);
        rx.push_string(&text, &mut self.cx);
        Ok(())
    }

    async fn read_raw(&mut self) -> Result<Vec<UcToken>> {
        self.reader.skip();
        self.reader.find(raw_span()).await?;
        let mut tokens = self.reader.consume();
        trim_blanks(&mut tokens);
        Ok(tokens)
    }

    /// Bare word: a primitive or a map key
    async fn read_word(&mut self) -> Result<String> {
        self.reader.skip();
        self.reader
            .find(|token| {
                if ends_word(token) {
                    UcFind::Reject
                } else {
                    UcFind::Undecided
                }
            })
            .await?;
        let mut tokens = self.reader.consume();
        trim_blanks(&mut tokens);
        let start = tokens.iter().take_while(|token| token.is_blank()).count();
        Ok(print_uc_tokens(&tokens[start..]))
    }

    fn push_primitive(&mut self, rx: &mut dyn Ucrx, primitive: UcPrimitive<'_>) {
        let cx = &mut self.cx;
        match primitive {
            UcPrimitive::Bool(value) => {
                rx.push_bool(value, cx);
            }
            UcPrimitive::Null => {
                rx.push_null(cx);
            }
            UcPrimitive::Number(value) => {
                rx.push_number(value, cx);
            }
            UcPrimitive::BigInt(value) => {
                rx.push_bigint(&value, cx);
            }
            UcPrimitive::String(value) => {
                rx.push_string(value, cx);
            }
            UcPrimitive::EmptyList => {
                rx.push_empty_list(cx);
            }
            UcPrimitive::EmptyMap => {
                rx.push_map_end(cx);
            }
            UcPrimitive::SuffixKey(key) => {
                cx.enter(UcPathStep::Key(key.to_string()));
                let is_map = match rx.enter_key(key, cx) {
                    UcrxKeyTarget::Entry(entry_rx) => {
                        entry_rx.push_string("", cx);
                        true
                    }
                    UcrxKeyTarget::Skip => true,
                    UcrxKeyTarget::NotMap => false,
                };
                cx.leave();
                if is_map {
                    rx.push_map_end(cx);
                }
            }
            UcPrimitive::Entity(entity) => self.push_entity(rx, entity),
        }
    }

    /// Offers an entity to the extensions, then to the receiver
    fn push_entity(&mut self, rx: &mut dyn Ucrx, entity: &str) {
        let options = self.options;
        if options.extensions.handle_entity(entity, rx, &mut self.cx) == UcrxOutcome::Unsupported {
            rx.push_entity(entity, &mut self.cx);
        }
    }

    /// Skips blanks and classifies the next token
    async fn lookahead(&mut self) -> Result<Lookahead> {
        loop {
            match self.reader.peek().await?.map(classify) {
                None => return Ok(Lookahead::End),
                Some(Some(kind)) => return Ok(kind),
                Some(None) => {
                    self.reader.next().await?;
                }
            }
        }
    }

    /// Rejects the next token as unexpected and stops reading
    async fn reject_next(&mut self) -> Result<()> {
        let rejection = match self.reader.peek().await? {
            Some(token) => unexpected_token(token),
            None => return Ok(()),
        };
        self.cx.reject(rejection);
        self.flush_rejections()
    }

    /// Rejects unexpected tokens after an item and skips to the next `,` or `)`
    async fn skip_unexpected(&mut self) -> Result<()> {
        let rejection = match self.reader.peek().await? {
            Some(token) => unexpected_token(token),
            None => return Ok(()),
        };
        self.cx.reject(rejection);
        self.flush_rejections()?;

        self.reader.skip();
        self.reader.find(garbage_span()).await?;
        self.reader.skip();
        Ok(())
    }

    fn enter_level(&mut self) -> Result<()> {
        if self.depth >= self.options.max_depth {
            return Err(UcError::DepthExceeded {
                limit: self.options.max_depth,
                path: format_uc_path(self.cx.path()),
            });
        }
        self.depth += 1;
        Ok(())
    }

    /// Funnels receiver rejections to the reader
    fn flush_rejections(&mut self) -> Result<()> {
        for rejection in self.cx.take_rejections() {
            self.reader.error(rejection)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UcrxRejectionCode;
    use crate::lexer::tokenize_uc_charge;
    use futures::executor::block_on;

    fn parse_with(input: &str, options: &UcReaderOptions) -> (Option<UcValue>, Vec<UcrxRejection>) {
        let reader = UcSyncReader::new(tokenize_uc_charge(input).unwrap())
            .with_error_mode(UcErrorMode::Collect);
        let mut parser = UcParser::new(reader, options);
        let mut rx = UcValueRx::new();
        block_on(parser.parse(&mut rx)).unwrap();
        (rx.into_value(), parser.into_reader().take_rejections())
    }

    fn parse(input: &str) -> (Option<UcValue>, Vec<UcrxRejection>) {
        parse_with(input, &UcReaderOptions::default())
    }

    #[test]
    fn test_map_entries() {
        let (value, rejections) = parse("a(1)b((x)(y))c(1)(2)d");
        assert!(rejections.is_empty());
        assert_eq!(
            value,
            Some(UcValue::map([
                ("a", UcValue::Number(1.0)),
                ("b", UcValue::list([UcValue::from("x"), UcValue::from("y")])),
                ("c", UcValue::list([UcValue::Number(1.0), UcValue::Number(2.0)])),
                ("d", UcValue::from("")),
            ]))
        );
    }

    #[test]
    fn test_dollar_keys() {
        assert_eq!(parse("$").0, Some(UcValue::map::<_, &str>([])));
        assert_eq!(parse("$key").0, Some(UcValue::map([("key", UcValue::from(""))])));
        assert_eq!(
            parse("$(1)$!x(2)").0,
            Some(UcValue::map([
                ("", UcValue::Number(1.0)),
                ("!x", UcValue::Number(2.0)),
            ]))
        );
    }

    #[test]
    fn test_quoted_strings_keep_parentheses() {
        assert_eq!(parse("'a(b)c").0, Some(UcValue::from("a(b)c")));
        assert_eq!(parse("'123").0, Some(UcValue::from("123")));
        assert_eq!(
            parse("k('x,y)").0,
            Some(UcValue::map([(
                "k",
                UcValue::list([UcValue::from("x"), UcValue::from("y")])
            )]))
        );
    }

    #[test]
    fn test_padding_around_structure() {
        assert_eq!(
            parse(" a ( 1 ) b ( x y ) ").0,
            Some(UcValue::map([
                ("a", UcValue::Number(1.0)),
                ("b", UcValue::from("x y")),
            ]))
        );
    }

    #[test]
    fn test_unexpected_tokens_are_skipped() {
        let (value, rejections) = parse("'a\nb(c),2");
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].code, UcrxRejectionCode::InvalidSyntax);
        assert_eq!(rejections[0].message, "Unexpected text `b`");
        assert_eq!(
            value,
            Some(UcValue::list([UcValue::from("a"), UcValue::Number(2.0)]))
        );
    }

    #[test]
    fn test_stray_closing_parenthesis() {
        let (value, rejections) = parse("a)b");
        assert_eq!(value, Some(UcValue::from("a")));
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].message, "Unexpected reserved character `)`");
    }

    #[test]
    fn test_depth_limit() {
        let options = UcReaderOptions::default().with_max_depth(8);
        let input = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        let reader = UcSyncReader::new(tokenize_uc_charge(&input).unwrap());
        let mut parser = UcParser::new(reader, &options);
        let mut rx = UcValueRx::new();

        match block_on(parser.parse(&mut rx)) {
            Err(UcError::DepthExceeded { limit, .. }) => assert_eq!(limit, 8),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_directive_with_args() {
        let mut extensions = crate::extensions::UcExtensions::empty();
        extensions.add_directive("!sum", |rx: &mut dyn Ucrx, cx: &mut UcrxContext, args: &UcValue, value: &str| {
            let sum: f64 = args
                .as_list()
                .map(|items| items.iter().filter_map(UcValue::as_f64).sum())
                .unwrap_or(0.0);
            rx.push_string(&format!("{}{}", sum, value), cx)
        });
        let options = UcReaderOptions::default().with_extensions(extensions);

        let (value, rejections) = parse_with("!sum(1,2,3)px", &options);
        assert!(rejections.is_empty());
        assert_eq!(value, Some(UcValue::from("6px")));

        let (value, _) = parse_with("!other(1)x", &options);
        assert_eq!(value, Some(UcValue::Entity("!other(1)x".into())));
    }

    #[test]
    fn test_formats() {
        let mut extensions = crate::extensions::UcExtensions::empty();
        extensions.add_format("upper", |rx: &mut dyn Ucrx, cx: &mut UcrxContext, data: &str| {
            rx.push_string(&data.to_uppercase(), cx)
        });
        let options = UcReaderOptions::default().with_extensions(extensions);

        assert_eq!(parse_with("!format'upper(abc)", &options).0, Some(UcValue::from("ABC")));
        assert_eq!(
            parse_with("!format'raw(a(b))", &options).0,
            Some(UcValue::Formatted {
                format: "raw".into(),
                data: "a(b)".into()
            })
        );
    }

    fn read_inset_tokens(single: bool) -> (Option<UcValue>, Vec<UcrxRejection>) {
        let tokens = vec![
            UcToken::InsetStart(3),
            UcToken::text("1"),
            UcToken::Reserved(b','),
            UcToken::text("2"),
            UcToken::InsetEnd(3),
        ];
        let options = UcReaderOptions::default();
        let reader = UcSyncReader::new(tokens).with_error_mode(UcErrorMode::Collect);
        let mut parser = UcParser::new(reader, &options);
        let mut rx = UcValueRx::new();

        block_on(async {
            parser.reader_mut().next().await.unwrap();
            parser.read_inset(&mut rx, 3, single).await.unwrap();
            assert_eq!(parser.reader_mut().next().await.unwrap(), None);
        });
        (rx.into_value(), parser.into_reader().take_rejections())
    }

    #[test]
    fn test_single_value_inset_stops_at_comma() {
        let (value, rejections) = read_inset_tokens(true);
        assert_eq!(value, Some(UcValue::Number(1.0)));
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].message, "Unexpected reserved character `,`");

        let (value, rejections) = read_inset_tokens(false);
        assert!(rejections.is_empty());
        assert_eq!(
            value,
            Some(UcValue::list([UcValue::Number(1.0), UcValue::Number(2.0)]))
        );
    }
}
