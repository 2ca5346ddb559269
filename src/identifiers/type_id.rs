use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Observable kind: the leading character of a RINEX observable code.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ObsKind {
    PseudoRange,
    Phase,
    Doppler,
    Snr,
}

impl ObsKind {
    fn char(&self) -> char {
        match self {
            Self::PseudoRange => 'C',
            Self::Phase => 'L',
            Self::Doppler => 'D',
            Self::Snr => 'S',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            'C' => Some(Self::PseudoRange),
            'L' => Some(Self::Phase),
            'D' => Some(Self::Doppler),
            'S' => Some(Self::Snr),
            _ => None,
        }
    }
}

/// A raw (4-char, tracking-code resolved) or canonical (3-char, tracking-code
/// dropped) observable signal tag, spec.md §3: `{C|L|D|S}{band}{tracking}{system}`
/// and its canonical form `{C|L|D|S}{band}{system}`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Signal {
    pub kind: ObsKind,
    /// Frequency band digit, e.g. 1, 2, 5, 6, 7, 8.
    pub band: u8,
    /// Tracking channel character (e.g. `'W'`, `'C'`, `'Q'`). `None` once the
    /// signal has been shortened to its canonical 3-char form.
    pub tracking: Option<char>,
    /// Constellation character: `G`,`E`,`C`,`R`,`J`,`S`,`I`.
    pub system: char,
}

impl Signal {
    pub fn raw(kind: ObsKind, band: u8, tracking: char, system: char) -> Self {
        Self {
            kind,
            band,
            tracking: Some(tracking),
            system,
        }
    }

    pub fn canonical(kind: ObsKind, band: u8, system: char) -> Self {
        Self {
            kind,
            band,
            tracking: None,
            system,
        }
    }

    /// Drops the tracking channel, producing the canonical 3-char form.
    /// See spec.md §2 step 2 and §8 round-trip property.
    pub fn shorten(&self) -> Self {
        Self::canonical(self.kind, self.band, self.system)
    }

    /// Parses a raw 4-char tag such as `"C1WG"` or a canonical 3-char tag
    /// such as `"C1G"`.
    pub fn parse(tag: &str) -> Option<Self> {
        let chars: Vec<char> = tag.chars().collect();
        match chars.len() {
            3 => {
                let kind = ObsKind::from_char(chars[0])?;
                let band = chars[1].to_digit(10)? as u8;
                let system = chars[2];
                Some(Self::canonical(kind, band, system))
            },
            4 => {
                let kind = ObsKind::from_char(chars[0])?;
                let band = chars[1].to_digit(10)? as u8;
                let tracking = chars[2];
                let system = chars[3];
                Some(Self::raw(kind, band, tracking, system))
            },
            _ => None,
        }
    }

    pub fn is_code(&self) -> bool {
        self.kind == ObsKind::PseudoRange
    }

    pub fn is_phase(&self) -> bool {
        self.kind == ObsKind::Phase
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tracking {
            Some(t) => write!(f, "{}{}{}{}", self.kind.char(), self.band, t, self.system),
            None => write!(f, "{}{}{}", self.kind.char(), self.band, self.system),
        }
    }
}

/// An ordered, deduplicated set of frequency bands, used as the key for
/// triple/quad/quintuple-frequency ionosphere-free combinations
/// (spec.md §4.2 "Triple/quad/quintuple ionosphere-free").
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bands(pub Vec<u8>);

impl fmt::Display for Bands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{}", b)?;
        }
        Ok(())
    }
}

/// The closed vocabulary of value types that can appear in a
/// [crate::data::TypeValueMap] (spec.md §3 `TypeID`). Every raw/canonical
/// observable, every derived combination and every solver-internal scalar
/// named anywhere in spec.md §2-§4 has a variant (or is built from one via
/// the recursive `Box<TypeId>` payload carried by wrapper variants such as
/// `Prefit`/`Ambiguity`/`SlantIono`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TypeId {
    /// Raw or canonical observable, see [Signal].
    Obs(Signal),
    /// `MW{i}{j}{sys}` Melbourne-Wubbena combination.
    Mw(u8, u8, char),
    /// `GF{i}{j}{sys}` geometry-free combination.
    Gf(u8, u8, char),
    /// `PC{freqs}{sys}` ionosphere-free code combination.
    Pc(Bands, char),
    /// `LC{freqs}{sys}` ionosphere-free phase combination.
    Lc(Bands, char),
    /// `prefit{type}` prefit residual of the wrapped observable/combination.
    Prefit(Box<TypeId>),
    /// `B{signal}` per-arc ambiguity of a phase signal.
    Ambiguity(Box<TypeId>),
    /// `BWL{ij}` wide-lane ambiguity.
    AmbiguityWl(u8, u8, char),
    /// `BLC{...}` ionosphere-free-combination ambiguity.
    AmbiguityLc(Bands, char),
    /// Slant ionospheric mapping function value.
    IonoMap,
    /// Slant ionospheric delay for the wrapped signal.
    SlantIono(Box<TypeId>),
    /// Per-signal phase wind-up correction, in cycles.
    WindUp(Box<TypeId>),
    /// Per-signal satellite phase-center correction.
    SatPCenter(Box<TypeId>),
    /// Per-signal receiver phase-center correction.
    RcvCorr(Box<TypeId>),
    /// Per-signal satellite clock delta (group-delay corrected).
    SatClockDelta(Box<TypeId>),
    /// Geometric range.
    Rho,
    /// North direction-cosine coefficient for the [Self::Dn] unknown.
    DirCosN,
    /// East direction-cosine coefficient for the [Self::De] unknown.
    DirCosE,
    /// Up direction-cosine coefficient for the [Self::Du] unknown.
    DirCosU,
    /// Relativistic clock correction.
    Relativity,
    /// Gravitational (Shapiro) delay.
    GravDelay,
    /// Dry troposphere mapping function.
    DryMap,
    /// Wet troposphere mapping function.
    WetMap,
    /// Slant troposphere delay (dry+wet, mapped).
    TropoSlant,
    /// North troposphere gradient mapping.
    GradN,
    /// East troposphere gradient mapping.
    GradE,
    /// Measurement weight/variance assigned to the wrapped prefit.
    Weight(Box<TypeId>),
    /// Inter-frequency/inter-system bias for the wrapped non-primary signal.
    Ifb(Box<TypeId>),
    /// Cycle-slip flag, 0.0 or 1.0.
    CsFlag,
    /// Current arc counter.
    Arc,
    /// North receiver position perturbation.
    Dn,
    /// East receiver position perturbation.
    De,
    /// Up receiver position perturbation.
    Du,
    /// Per-system receiver clock offset, in meters.
    Cdt(char),
    /// Estimated wet tropospheric zenith delay.
    WetTropo,
}

impl TypeId {
    /// Shortens the wrapped (or bare) observable to its canonical 3-char
    /// form, leaving derived types untouched.
    pub fn shorten(&self) -> TypeId {
        match self {
            TypeId::Obs(s) => TypeId::Obs(s.shorten()),
            other => other.clone(),
        }
    }

    pub fn prefit_of(inner: TypeId) -> TypeId {
        TypeId::Prefit(Box::new(inner))
    }

    pub fn ambiguity_of(inner: TypeId) -> TypeId {
        TypeId::Ambiguity(Box::new(inner))
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeId::Obs(s) => write!(f, "{}", s),
            TypeId::Mw(i, j, sys) => write!(f, "MW{}{}{}", i, j, sys),
            TypeId::Gf(i, j, sys) => write!(f, "GF{}{}{}", i, j, sys),
            TypeId::Pc(b, sys) => write!(f, "PC{}{}", b, sys),
            TypeId::Lc(b, sys) => write!(f, "LC{}{}", b, sys),
            TypeId::Prefit(t) => write!(f, "prefit{}", t),
            TypeId::Ambiguity(t) => write!(f, "B{}", t),
            TypeId::AmbiguityWl(i, j, sys) => write!(f, "BWL{}{}{}", i, j, sys),
            TypeId::AmbiguityLc(b, sys) => write!(f, "BLC{}{}", b, sys),
            TypeId::IonoMap => write!(f, "ionoMap"),
            TypeId::SlantIono(t) => write!(f, "slantIono{}", t),
            TypeId::WindUp(t) => write!(f, "windUp{}", t),
            TypeId::SatPCenter(t) => write!(f, "satPCenter{}", t),
            TypeId::RcvCorr(t) => write!(f, "rcvCorr{}", t),
            TypeId::SatClockDelta(t) => write!(f, "satClockDelta{}", t),
            TypeId::Rho => write!(f, "rho"),
            TypeId::DirCosN => write!(f, "dirCosN"),
            TypeId::DirCosE => write!(f, "dirCosE"),
            TypeId::DirCosU => write!(f, "dirCosU"),
            TypeId::Relativity => write!(f, "relativity"),
            TypeId::GravDelay => write!(f, "gravDelay"),
            TypeId::DryMap => write!(f, "dryMap"),
            TypeId::WetMap => write!(f, "wetMap"),
            TypeId::TropoSlant => write!(f, "tropoSlant"),
            TypeId::GradN => write!(f, "gradN"),
            TypeId::GradE => write!(f, "gradE"),
            TypeId::Weight(t) => write!(f, "weight{}", t),
            TypeId::Ifb(t) => write!(f, "ifb{}", t),
            TypeId::CsFlag => write!(f, "CSFlag"),
            TypeId::Arc => write!(f, "arc"),
            TypeId::Dn => write!(f, "dN"),
            TypeId::De => write!(f, "dE"),
            TypeId::Du => write!(f, "dU"),
            TypeId::Cdt(sys) => write!(f, "cdt{}", sys),
            TypeId::WetTropo => write!(f, "wetTropo"),
        }
    }
}

/// Ordered tracking-code preference table for `ChooseOptimalObs`
/// (spec.md §2 step 2 and §9 "Observable tag normalization"). Returns
/// the priority-ordered list of tracking channel characters for a given
/// constellation and frequency band: the first entry present in an
/// epoch's observation set is selected.
pub fn tracking_priority(system: char, band: u8) -> &'static [char] {
    match (system, band) {
        ('G', 1) => &['W', 'C', 'S', 'L', 'X', 'P', 'Y', 'M', 'N'],
        ('G', 2) => &['W', 'C', 'D', 'S', 'L', 'X', 'P', 'Y', 'M', 'N'],
        ('G', 5) => &['Q', 'I', 'X'],
        ('E', 1) => &['C', 'X', 'B', 'A', 'Z'],
        ('E', 5) => &['Q', 'I', 'X'],
        ('E', 7) => &['Q', 'I', 'X'],
        ('E', 8) => &['Q', 'I', 'X'],
        ('E', 6) => &['C', 'X', 'B', 'A', 'Z'],
        ('C', 2) => &['I', 'Q', 'X'],
        ('C', 6) => &['I', 'Q', 'X'],
        ('C', 7) => &['I', 'Q', 'X'],
        ('R', 1) => &['C', 'P'],
        ('R', 2) => &['C', 'P'],
        ('J', 1) => &['C', 'S', 'L', 'X', 'Z'],
        ('J', 2) => &['S', 'L', 'X'],
        ('J', 5) => &['Q', 'I', 'X'],
        _ => &['X', 'C', 'I', 'Q'],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_to_canonical_round_trip() {
        // spec.md §8: 4-char -> 3-char -> 4-char is identity for the chosen code.
        let raw = Signal::parse("C1WG").unwrap();
        let canonical = raw.shorten();
        assert_eq!(canonical.to_string(), "C1G");

        let priority = tracking_priority('G', 1);
        let chosen = priority[0];
        let rebuilt = Signal::raw(canonical.kind, canonical.band, chosen, canonical.system);
        assert_eq!(rebuilt, raw);
    }

    #[test]
    fn parses_canonical_tag() {
        let s = Signal::parse("L1G").unwrap();
        assert_eq!(s.tracking, None);
        assert!(s.is_phase());
    }

    #[test]
    fn type_id_ordering_is_total() {
        let mut v = vec![
            TypeId::WetTropo,
            TypeId::Rho,
            TypeId::Obs(Signal::canonical(ObsKind::PseudoRange, 1, 'G')),
        ];
        v.sort();
        // no panic: Ord is total over the closed enum
        assert_eq!(v.len(), 3);
    }
}
