//! Well-Known Binary.
//!
//! Reads both byte orders, ISO dimension codes (1000/2000/3000 offsets), and
//! EWKB flag bits with an optional SRID. Extra ordinates are dropped. Output is
//! always 2D little-endian ISO WKB, with `POINT EMPTY` encoded as NaN ordinates.

use super::{line_from, ring_from};
use crate::error::{Result, TgError};
use crate::geom::{Coord, Geom, GeomType, Geometry, Line, Polygon};

const EWKB_Z: u32 = 0x8000_0000;
const EWKB_M: u32 = 0x4000_0000;
const EWKB_SRID: u32 = 0x2000_0000;
const MAX_DEPTH: usize = 64;

/// Parses a WKB record; trailing bytes are an error.
pub fn parse(bytes: &[u8]) -> Result<Geom> {
    let mut reader = Reader { buf: bytes, off: 0 };
    let shape = reader.geometry(None, 0)?;
    if reader.remaining() != 0 {
        return Err(reader.error(&format!("{} trailing bytes", reader.remaining())));
    }
    Ok(Geom::new(shape))
}

/// Encodes a geometry as little-endian 2D WKB.
pub fn write(geom: &Geom) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    write_geometry(&mut out, geom.shape());
    out
}

#[derive(Clone, Copy)]
enum Order {
    Big,
    Little,
}

struct Reader<'a> {
    buf: &'a [u8],
    off: usize,
}

impl<'a> Reader<'a> {
    fn error(&self, what: &str) -> TgError {
        TgError::parse(format!("invalid binary: {what} at byte {}", self.off))
    }

    fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.off)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self
            .off
            .checked_add(N)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| self.error("unexpected end of input"))?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.off..end]);
        self.off = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take::<1>()?[0])
    }

    fn u32(&mut self, order: Order) -> Result<u32> {
        let raw = self.take::<4>()?;
        Ok(match order {
            Order::Big => u32::from_be_bytes(raw),
            Order::Little => u32::from_le_bytes(raw),
        })
    }

    fn f64(&mut self, order: Order) -> Result<f64> {
        let raw = self.take::<8>()?;
        Ok(match order {
            Order::Big => f64::from_be_bytes(raw),
            Order::Little => f64::from_le_bytes(raw),
        })
    }

    /// Reads an element count, refusing counts the remaining input cannot hold.
    fn count(&mut self, order: Order, min_item_len: usize) -> Result<usize> {
        let n = self.u32(order)? as usize;
        if n.saturating_mul(min_item_len) > self.remaining() {
            return Err(self.error(&format!("count {n} exceeds remaining input")));
        }
        Ok(n)
    }

    fn coord(&mut self, order: Order, dims: usize) -> Result<Coord> {
        let x = self.f64(order)?;
        let y = self.f64(order)?;
        for _ in 2..dims {
            self.f64(order)?;
        }
        let c = Coord::new(x, y);
        if !c.is_finite() {
            return Err(self.error("coordinate is not finite"));
        }
        Ok(c)
    }

    fn coords(&mut self, order: Order, dims: usize) -> Result<Vec<Coord>> {
        let n = self.count(order, dims * 8)?;
        (0..n).map(|_| self.coord(order, dims)).collect()
    }

    fn header(&mut self) -> Result<(Order, GeomType, usize)> {
        let order = match self.u8()? {
            0 => Order::Big,
            1 => Order::Little,
            other => return Err(self.error(&format!("unknown byte order {other}"))),
        };
        let code = self.u32(order)?;
        let mut dims = 2;
        if code & EWKB_Z != 0 {
            dims += 1;
        }
        if code & EWKB_M != 0 {
            dims += 1;
        }
        if code & EWKB_SRID != 0 {
            self.u32(order)?;
        }
        let base = code & 0x0FFF_FFFF;
        dims += match base / 1000 {
            0 => 0,
            1 | 2 => 1,
            3 => 2,
            _ => return Err(self.error(&format!("unknown geometry type {code}"))),
        };
        let kind = GeomType::from_wkb_code(base % 1000)
            .ok_or_else(|| self.error(&format!("unknown geometry type {code}")))?;
        Ok((order, kind, dims.min(4)))
    }

    fn geometry(&mut self, expect: Option<GeomType>, depth: usize) -> Result<Geometry> {
        if depth > MAX_DEPTH {
            return Err(self.error("collections nested too deeply"));
        }
        let start = self.off;
        let (order, kind, dims) = self.header()?;
        if let Some(expected) = expect {
            if expected != kind {
                self.off = start;
                return Err(self.error(&format!("expected {expected}, found {kind}")));
            }
        }
        Ok(match kind {
            GeomType::Point => {
                let x = self.f64(order)?;
                let y = self.f64(order)?;
                for _ in 2..dims {
                    self.f64(order)?;
                }
                if x.is_nan() && y.is_nan() {
                    Geometry::Point(None)
                } else if x.is_finite() && y.is_finite() {
                    Geometry::Point(Some(Coord::new(x, y)))
                } else {
                    return Err(self.error("coordinate is not finite"));
                }
            }
            GeomType::LineString => Geometry::LineString(self.line(order, dims)?),
            GeomType::Polygon => Geometry::Polygon(self.polygon(order, dims)?),
            GeomType::MultiPoint => {
                let n = self.count(order, 5)?;
                let mut pts = Vec::with_capacity(n);
                for _ in 0..n {
                    match self.geometry(Some(GeomType::Point), depth + 1)? {
                        Geometry::Point(Some(c)) => pts.push(c),
                        _ => return Err(self.error("empty point inside a multipoint")),
                    }
                }
                Geometry::MultiPoint(pts)
            }
            GeomType::MultiLineString => {
                let n = self.count(order, 5)?;
                let mut lines = Vec::with_capacity(n);
                for _ in 0..n {
                    if let Geometry::LineString(l) =
                        self.geometry(Some(GeomType::LineString), depth + 1)?
                    {
                        lines.push(l);
                    }
                }
                Geometry::MultiLineString(lines)
            }
            GeomType::MultiPolygon => {
                let n = self.count(order, 5)?;
                let mut polys = Vec::with_capacity(n);
                for _ in 0..n {
                    if let Geometry::Polygon(p) = self.geometry(Some(GeomType::Polygon), depth + 1)? {
                        polys.push(p);
                    }
                }
                Geometry::MultiPolygon(polys)
            }
            GeomType::GeometryCollection => {
                let n = self.count(order, 5)?;
                let mut geoms = Vec::with_capacity(n);
                for _ in 0..n {
                    geoms.push(self.geometry(None, depth + 1)?);
                }
                Geometry::GeometryCollection(geoms)
            }
        })
    }

    fn line(&mut self, order: Order, dims: usize) -> Result<Line> {
        let start = self.off;
        let points = self.coords(order, dims)?;
        line_from(points).map_err(|msg| {
            TgError::parse(format!("invalid binary: {msg} at byte {start}"))
        })
    }

    fn polygon(&mut self, order: Order, dims: usize) -> Result<Polygon> {
        let n = self.count(order, 4)?;
        let mut rings = Vec::with_capacity(n);
        for _ in 0..n {
            let start = self.off;
            let points = self.coords(order, dims)?;
            let ring = ring_from(points).map_err(|msg| {
                TgError::parse(format!("invalid binary: {msg} at byte {start}"))
            })?;
            rings.push(ring);
        }
        let mut iter = rings.into_iter();
        Ok(match iter.next() {
            Some(exterior) => Polygon::new(exterior, iter.collect()),
            None => Polygon::default(),
        })
    }
}

fn put_header(out: &mut Vec<u8>, kind: GeomType) {
    out.push(1);
    out.extend_from_slice(&kind.wkb_code().to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: usize) {
    out.extend_from_slice(&(v as u32).to_le_bytes());
}

fn put_coord(out: &mut Vec<u8>, c: Coord) {
    out.extend_from_slice(&c.x.to_le_bytes());
    out.extend_from_slice(&c.y.to_le_bytes());
}

fn put_coords(out: &mut Vec<u8>, pts: &[Coord]) {
    put_u32(out, pts.len());
    for c in pts {
        put_coord(out, *c);
    }
}

fn put_polygon_body(out: &mut Vec<u8>, poly: &Polygon) {
    if poly.is_empty() {
        put_u32(out, 0);
        return;
    }
    put_u32(out, 1 + poly.holes().len());
    for ring in poly.rings() {
        put_coords(out, ring.points());
    }
}

fn write_geometry(out: &mut Vec<u8>, shape: &Geometry) {
    put_header(out, shape.geom_type());
    match shape {
        Geometry::Point(Some(c)) => put_coord(out, *c),
        Geometry::Point(None) => put_coord(out, Coord::new(f64::NAN, f64::NAN)),
        Geometry::LineString(l) => put_coords(out, l.points()),
        Geometry::Polygon(p) => put_polygon_body(out, p),
        Geometry::MultiPoint(pts) => {
            put_u32(out, pts.len());
            for c in pts {
                put_header(out, GeomType::Point);
                put_coord(out, *c);
            }
        }
        Geometry::MultiLineString(lines) => {
            put_u32(out, lines.len());
            for l in lines {
                put_header(out, GeomType::LineString);
                put_coords(out, l.points());
            }
        }
        Geometry::MultiPolygon(polys) => {
            put_u32(out, polys.len());
            for p in polys {
                put_header(out, GeomType::Polygon);
                put_polygon_body(out, p);
            }
        }
        Geometry::GeometryCollection(geoms) => {
            put_u32(out, geoms.len());
            for g in geoms {
                write_geometry(out, g);
            }
        }
    }
}
