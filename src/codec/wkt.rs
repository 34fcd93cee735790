//! Well-Known Text.
//!
//! Keywords are case-insensitive and may carry `Z`, `M`, or `ZM` tags; extra
//! ordinates are read and dropped. An optional EWKT `SRID=n;` prefix is skipped.

use super::{line_from, ring_from, write_num};
use crate::error::{Result, TgError};
use crate::geom::{Coord, Geom, GeomType, Geometry, Line, Polygon, Ring};

/// Parses WKT text.
pub fn parse(text: &str) -> Result<Geom> {
    let mut p = Parser::new(text);
    p.skip_srid();
    let shape = p.geometry()?;
    p.skip_ws();
    if p.pos < p.src.len() {
        return Err(p.error("unexpected trailing characters"));
    }
    Ok(Geom::new(shape))
}

/// Renders a geometry as canonical WKT.
pub fn write(shape: &Geometry) -> String {
    let mut out = String::with_capacity(64);
    write_geometry(&mut out, shape);
    out
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            src: text.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, what: &str) -> TgError {
        TgError::parse(format!("invalid text: {what} at offset {}", self.pos))
    }

    fn skip_ws(&mut self) {
        while self
            .src
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.src.get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.eat(byte) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn word(&mut self) -> &'a str {
        let src: &'a [u8] = self.src;
        self.skip_ws();
        let start = self.pos;
        while self
            .src
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_alphabetic())
        {
            self.pos += 1;
        }
        std::str::from_utf8(&src[start..self.pos]).unwrap_or_default()
    }

    fn skip_srid(&mut self) {
        self.skip_ws();
        let rest = &self.src[self.pos..];
        if rest.len() > 5 && rest[..5].eq_ignore_ascii_case(b"SRID=") {
            if let Some(semi) = rest.iter().position(|b| *b == b';') {
                self.pos += semi + 1;
            }
        }
    }

    fn starts_number(&mut self) -> bool {
        matches!(self.peek(), Some(b'0'..=b'9' | b'-' | b'+' | b'.'))
    }

    fn number(&mut self) -> Result<f64> {
        self.skip_ws();
        let start = self.pos;
        while self
            .src
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E'))
        {
            self.pos += 1;
        }
        let raw = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default();
        if raw.is_empty() {
            return Err(self.error("expected a number"));
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            Ok(_) => Err(self.error("coordinate is not finite")),
            Err(_) => Err(self.error(&format!("malformed number '{raw}'"))),
        }
    }

    /// Reads one position; `dims` is the declared ordinate count, if any.
    fn coord(&mut self, dims: Option<usize>) -> Result<Coord> {
        let x = self.number()?;
        let y = self.number()?;
        match dims {
            Some(n) => {
                for _ in 2..n {
                    self.number()?;
                }
            }
            None => {
                for _ in 0..2 {
                    if !self.starts_number() {
                        break;
                    }
                    self.number()?;
                }
            }
        }
        Ok(Coord::new(x, y))
    }

    fn coords(&mut self, dims: Option<usize>) -> Result<Vec<Coord>> {
        self.expect(b'(')?;
        let mut out = vec![self.coord(dims)?];
        while self.eat(b',') {
            out.push(self.coord(dims)?);
        }
        self.expect(b')')?;
        Ok(out)
    }

    fn line(&mut self, dims: Option<usize>) -> Result<Line> {
        let start = self.pos;
        let points = self.coords(dims)?;
        line_from(points).map_err(|msg| self.error_at(start, msg))
    }

    fn ring(&mut self, dims: Option<usize>) -> Result<Ring> {
        let start = self.pos;
        let points = self.coords(dims)?;
        ring_from(points).map_err(|msg| self.error_at(start, msg))
    }

    fn polygon(&mut self, dims: Option<usize>) -> Result<Polygon> {
        self.expect(b'(')?;
        let exterior = self.ring(dims)?;
        let mut holes = Vec::new();
        while self.eat(b',') {
            holes.push(self.ring(dims)?);
        }
        self.expect(b')')?;
        Ok(Polygon::new(exterior, holes))
    }

    fn error_at(&self, pos: usize, what: &str) -> TgError {
        TgError::parse(format!("invalid text: {what} at offset {pos}"))
    }

    /// Consumes an `EMPTY` marker if one comes next.
    fn eat_empty(&mut self) -> bool {
        let save = self.pos;
        if self.word().eq_ignore_ascii_case("EMPTY") {
            true
        } else {
            self.pos = save;
            false
        }
    }

    /// Reads the geometry keyword and its optional dimension tag.
    fn header(&mut self) -> Result<(GeomType, Option<usize>)> {
        let start = self.pos;
        let word = self.word();
        if word.is_empty() {
            return Err(self.error("expected a geometry keyword"));
        }
        let (kind, suffix) = match GeomType::from_wkt_keyword(word) {
            Some(kind) => (kind, ""),
            None => split_dim_suffix(word)
                .ok_or_else(|| self.error_at(start, &format!("unknown geometry type '{word}'")))?,
        };
        let tag = if suffix.is_empty() {
            let save = self.pos;
            let next = self.word();
            if is_dim_tag(next) {
                next
            } else {
                self.pos = save;
                ""
            }
        } else {
            suffix
        };
        let dims = match tag.len() {
            0 => None,
            1 => Some(3),
            _ => Some(4),
        };
        Ok((kind, dims))
    }

    fn geometry(&mut self) -> Result<Geometry> {
        let (kind, dims) = self.header()?;
        if self.eat_empty() {
            return Ok(empty_of(kind));
        }
        Ok(match kind {
            GeomType::Point => {
                self.expect(b'(')?;
                let c = self.coord(dims)?;
                self.expect(b')')?;
                Geometry::Point(Some(c))
            }
            GeomType::LineString => Geometry::LineString(self.line(dims)?),
            GeomType::Polygon => Geometry::Polygon(self.polygon(dims)?),
            GeomType::MultiPoint => {
                self.expect(b'(')?;
                let mut pts = Vec::new();
                loop {
                    if self.eat(b'(') {
                        pts.push(self.coord(dims)?);
                        self.expect(b')')?;
                    } else {
                        pts.push(self.coord(dims)?);
                    }
                    if !self.eat(b',') {
                        break;
                    }
                }
                self.expect(b')')?;
                Geometry::MultiPoint(pts)
            }
            GeomType::MultiLineString => {
                Geometry::MultiLineString(self.members(|p| {
                    if p.eat_empty() {
                        Ok(Line::default())
                    } else {
                        p.line(dims)
                    }
                })?)
            }
            GeomType::MultiPolygon => Geometry::MultiPolygon(self.members(|p| {
                if p.eat_empty() {
                    Ok(Polygon::default())
                } else {
                    p.polygon(dims)
                }
            })?),
            GeomType::GeometryCollection => {
                Geometry::GeometryCollection(self.members(Self::geometry)?)
            }
        })
    }

    fn members<T, F>(&mut self, mut item: F) -> Result<Vec<T>>
    where
        F: FnMut(&mut Self) -> Result<T>,
    {
        self.expect(b'(')?;
        let mut out = vec![item(self)?];
        while self.eat(b',') {
            out.push(item(self)?);
        }
        self.expect(b')')?;
        Ok(out)
    }
}

fn is_dim_tag(word: &str) -> bool {
    ["Z", "M", "ZM"].iter().any(|t| t.eq_ignore_ascii_case(word))
}

fn split_dim_suffix(word: &str) -> Option<(GeomType, &str)> {
    for tag_len in [2, 1] {
        if word.len() > tag_len {
            let (head, tag) = word.split_at(word.len() - tag_len);
            if is_dim_tag(tag) {
                if let Some(kind) = GeomType::from_wkt_keyword(head) {
                    return Some((kind, tag));
                }
            }
        }
    }
    None
}

fn empty_of(kind: GeomType) -> Geometry {
    match kind {
        GeomType::Point => Geometry::Point(None),
        GeomType::LineString => Geometry::LineString(Line::default()),
        GeomType::Polygon => Geometry::Polygon(Polygon::default()),
        GeomType::MultiPoint => Geometry::MultiPoint(Vec::new()),
        GeomType::MultiLineString => Geometry::MultiLineString(Vec::new()),
        GeomType::MultiPolygon => Geometry::MultiPolygon(Vec::new()),
        GeomType::GeometryCollection => Geometry::GeometryCollection(Vec::new()),
    }
}

fn write_coord(out: &mut String, c: Coord) {
    write_num(out, c.x);
    out.push(' ');
    write_num(out, c.y);
}

fn write_coords(out: &mut String, pts: &[Coord]) {
    out.push('(');
    for (i, c) in pts.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_coord(out, *c);
    }
    out.push(')');
}

fn write_line_body(out: &mut String, line: &Line) {
    if line.is_empty() {
        out.push_str("EMPTY");
    } else {
        write_coords(out, line.points());
    }
}

fn write_polygon_body(out: &mut String, poly: &Polygon) {
    if poly.is_empty() {
        out.push_str("EMPTY");
        return;
    }
    out.push('(');
    for (i, ring) in poly.rings().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_coords(out, ring.points());
    }
    out.push(')');
}

fn write_list<T>(out: &mut String, items: &[T], mut each: impl FnMut(&mut String, &T)) {
    out.push('(');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        each(out, item);
    }
    out.push(')');
}

fn write_geometry(out: &mut String, shape: &Geometry) {
    out.push_str(shape.geom_type().wkt_keyword());
    match shape {
        Geometry::Point(None) => out.push_str(" EMPTY"),
        Geometry::Point(Some(c)) => {
            out.push('(');
            write_coord(out, *c);
            out.push(')');
        }
        Geometry::LineString(l) if l.is_empty() => out.push_str(" EMPTY"),
        Geometry::LineString(l) => write_coords(out, l.points()),
        Geometry::Polygon(p) if p.is_empty() => out.push_str(" EMPTY"),
        Geometry::Polygon(p) => write_polygon_body(out, p),
        Geometry::MultiPoint(pts) if pts.is_empty() => out.push_str(" EMPTY"),
        Geometry::MultiPoint(pts) => write_coords(out, pts),
        Geometry::MultiLineString(lines) if lines.is_empty() => out.push_str(" EMPTY"),
        Geometry::MultiLineString(lines) => write_list(out, lines, write_line_body),
        Geometry::MultiPolygon(polys) if polys.is_empty() => out.push_str(" EMPTY"),
        Geometry::MultiPolygon(polys) => write_list(out, polys, write_polygon_body),
        Geometry::GeometryCollection(geoms) if geoms.is_empty() => out.push_str(" EMPTY"),
        Geometry::GeometryCollection(geoms) => write_list(out, geoms, write_geometry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(text: &str) -> String {
        write(parse(text).unwrap().shape())
    }

    #[test]
    fn canonical_output() {
        assert_eq!(roundtrip("LINESTRING (0 0, 1 1)"), "LINESTRING(0 0,1 1)");
        assert_eq!(roundtrip("point(1.111 2.222)"), "POINT(1.111 2.222)");
        assert_eq!(roundtrip("POINT (30 10)"), "POINT(30 10)");
        assert_eq!(
            roundtrip("POLYGON ((30 10, 40 40, 20 40, 10 20, 30 10))"),
            "POLYGON((30 10,40 40,20 40,10 20,30 10))"
        );
        assert_eq!(roundtrip("polygon((0 0,1 0,1 1))"), "POLYGON((0 0,1 0,1 1,0 0))");
    }

    #[test]
    fn multipoint_with_and_without_parens() {
        assert_eq!(
            roundtrip("MULTIPOINT ((10 40), (40 30), (20 20), (30 10))"),
            "MULTIPOINT(10 40,40 30,20 20,30 10)"
        );
        assert_eq!(
            roundtrip("MULTIPOINT (10 40, 40 30)"),
            "MULTIPOINT(10 40,40 30)"
        );
    }

    #[test]
    fn empties() {
        for text in [
            "POINT EMPTY",
            "LINESTRING EMPTY",
            "POLYGON EMPTY",
            "MULTIPOINT EMPTY",
            "MULTILINESTRING EMPTY",
            "MULTIPOLYGON EMPTY",
            "GEOMETRYCOLLECTION EMPTY",
        ] {
            assert_eq!(roundtrip(&text.to_lowercase()), text);
        }
        assert_eq!(
            roundtrip("MULTILINESTRING(EMPTY,(0 0,1 1))"),
            "MULTILINESTRING(EMPTY,(0 0,1 1))"
        );
    }

    #[test]
    fn nested_collections() {
        let text = "GEOMETRYCOLLECTION(POINT(40 10),LINESTRING(10 10,20 20,10 40),POLYGON((40 40,20 45,45 30,40 40)))";
        assert_eq!(roundtrip(text), text);
        let text = "MULTIPOLYGON(((30 20,45 40,10 40,30 20)),((15 5,40 10,10 20,5 10,15 5)))";
        assert_eq!(roundtrip(text), text);
    }

    #[test]
    fn dimensions_are_dropped() {
        assert_eq!(roundtrip("POINT Z (1 2 3)"), "POINT(1 2)");
        assert_eq!(roundtrip("POINTZM(1 2 3 4)"), "POINT(1 2)");
        assert_eq!(roundtrip("LINESTRING M (0 0 5, 1 1 6)"), "LINESTRING(0 0,1 1)");
        assert_eq!(roundtrip("POINT(1 2 3)"), "POINT(1 2)");
        assert_eq!(roundtrip("SRID=4326;POINT(1 2)"), "POINT(1 2)");
    }

    #[test]
    fn malformed_input() {
        for text in [
            "POINT(1 1",
            "POINT(1)",
            "POINT(a b)",
            "CIRCLE(1 1)",
            "",
            "LINESTRING(0 0)",
            "POLYGON((0 0,1 1,0 0))",
            "POINT(1 1) extra",
            "POINT(1e400 1)",
        ] {
            let err = parse(text).unwrap_err();
            assert!(
                err.to_string().starts_with("ParseError: invalid text"),
                "{text}: {err}"
            );
        }
    }
}
