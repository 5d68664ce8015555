//! Mapping between backend-native language codes and [`LocaleIdentifier`].
//!
//! Backends such as Tesseract name their trained data after ISO 639-2 codes
//! (`eng`, `deu`, `fra`), sometimes with a script suffix (`chi_sim`,
//! `srp_latn`). Everything that crosses the engine boundary uses the
//! canonical locale identifier instead.

use ocrkit_types::LocaleIdentifier;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("native language code '{code}' does not map to a known locale")]
pub struct UnrecognizedLocale {
    pub code: String,
}

impl UnrecognizedLocale {
    fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
        }
    }
}

/// ISO 639-2 (terminology and bibliographic) codes with their ISO 639-1
/// equivalent. `None` keeps the three-letter code as the language subtag.
const ISO_639_2: &[(&str, Option<&str>)] = &[
    ("aar", Some("aa")),
    ("abk", Some("ab")),
    ("afr", Some("af")),
    ("alb", Some("sq")),
    ("amh", Some("am")),
    ("ara", Some("ar")),
    ("arm", Some("hy")),
    ("asm", Some("as")),
    ("aze", Some("az")),
    ("bak", Some("ba")),
    ("baq", Some("eu")),
    ("bel", Some("be")),
    ("ben", Some("bn")),
    ("bod", Some("bo")),
    ("bos", Some("bs")),
    ("bre", Some("br")),
    ("bul", Some("bg")),
    ("bur", Some("my")),
    ("cat", Some("ca")),
    ("ceb", None),
    ("ces", Some("cs")),
    ("chi", Some("zh")),
    ("chr", None),
    ("chv", Some("cv")),
    ("cos", Some("co")),
    ("cym", Some("cy")),
    ("cze", Some("cs")),
    ("dan", Some("da")),
    ("deu", Some("de")),
    ("div", Some("dv")),
    ("dut", Some("nl")),
    ("dzo", Some("dz")),
    ("ell", Some("el")),
    ("eng", Some("en")),
    ("enm", None),
    ("epo", Some("eo")),
    ("est", Some("et")),
    ("eus", Some("eu")),
    ("fao", Some("fo")),
    ("fas", Some("fa")),
    ("fij", Some("fj")),
    ("fil", None),
    ("fin", Some("fi")),
    ("fra", Some("fr")),
    ("fre", Some("fr")),
    ("frm", None),
    ("fry", Some("fy")),
    ("geo", Some("ka")),
    ("ger", Some("de")),
    ("gla", Some("gd")),
    ("gle", Some("ga")),
    ("glg", Some("gl")),
    ("grc", None),
    ("gre", Some("el")),
    ("guj", Some("gu")),
    ("hat", Some("ht")),
    ("hau", Some("ha")),
    ("haw", None),
    ("heb", Some("he")),
    ("hin", Some("hi")),
    ("hrv", Some("hr")),
    ("hun", Some("hu")),
    ("hye", Some("hy")),
    ("ibo", Some("ig")),
    ("ice", Some("is")),
    ("iku", Some("iu")),
    ("ind", Some("id")),
    ("isl", Some("is")),
    ("ita", Some("it")),
    ("jav", Some("jv")),
    ("jpn", Some("ja")),
    ("kan", Some("kn")),
    ("kat", Some("ka")),
    ("kaz", Some("kk")),
    ("khm", Some("km")),
    ("kin", Some("rw")),
    ("kir", Some("ky")),
    ("kmr", None),
    ("kor", Some("ko")),
    ("kur", Some("ku")),
    ("lao", Some("lo")),
    ("lat", Some("la")),
    ("lav", Some("lv")),
    ("lit", Some("lt")),
    ("ltz", Some("lb")),
    ("lug", Some("lg")),
    ("mac", Some("mk")),
    ("mal", Some("ml")),
    ("mao", Some("mi")),
    ("mar", Some("mr")),
    ("may", Some("ms")),
    ("mkd", Some("mk")),
    ("mlg", Some("mg")),
    ("mlt", Some("mt")),
    ("mon", Some("mn")),
    ("mri", Some("mi")),
    ("msa", Some("ms")),
    ("mya", Some("my")),
    ("nep", Some("ne")),
    ("nld", Some("nl")),
    ("nno", Some("nn")),
    ("nob", Some("nb")),
    ("nor", Some("no")),
    ("oci", Some("oc")),
    ("ori", Some("or")),
    ("pan", Some("pa")),
    ("per", Some("fa")),
    ("pol", Some("pl")),
    ("por", Some("pt")),
    ("pus", Some("ps")),
    ("que", Some("qu")),
    ("ron", Some("ro")),
    ("rum", Some("ro")),
    ("rus", Some("ru")),
    ("san", Some("sa")),
    ("sin", Some("si")),
    ("slk", Some("sk")),
    ("slo", Some("sk")),
    ("slv", Some("sl")),
    ("smo", Some("sm")),
    ("sna", Some("sn")),
    ("snd", Some("sd")),
    ("som", Some("so")),
    ("spa", Some("es")),
    ("sqi", Some("sq")),
    ("srp", Some("sr")),
    ("sun", Some("su")),
    ("swa", Some("sw")),
    ("swe", Some("sv")),
    ("syr", None),
    ("tah", Some("ty")),
    ("tam", Some("ta")),
    ("tat", Some("tt")),
    ("tel", Some("te")),
    ("tgk", Some("tg")),
    ("tgl", Some("tl")),
    ("tha", Some("th")),
    ("tib", Some("bo")),
    ("tir", Some("ti")),
    ("ton", Some("to")),
    ("tsn", Some("tn")),
    ("tur", Some("tr")),
    ("uig", Some("ug")),
    ("ukr", Some("uk")),
    ("urd", Some("ur")),
    ("uzb", Some("uz")),
    ("vie", Some("vi")),
    ("wel", Some("cy")),
    ("wol", Some("wo")),
    ("xho", Some("xh")),
    ("yid", Some("yi")),
    ("yor", Some("yo")),
    ("zho", Some("zh")),
    ("zul", Some("zu")),
];

/// Resolves a backend-native language code into the canonical identifier
/// space.
pub fn resolve(native_code: &str) -> Result<LocaleIdentifier, UnrecognizedLocale> {
    let normalized = native_code.trim().to_ascii_lowercase();
    let (base, suffix) = match normalized.split_once('_') {
        Some((base, suffix)) => (base, Some(suffix)),
        None => (normalized.as_str(), None),
    };

    let language = language_subtag(base).ok_or_else(|| UnrecognizedLocale::new(native_code))?;
    let locale =
        LocaleIdentifier::new(language).map_err(|_| UnrecognizedLocale::new(native_code))?;

    match suffix {
        None => Ok(locale),
        Some(suffix) => {
            let script = script_subtag(suffix).ok_or_else(|| UnrecognizedLocale::new(native_code))?;
            locale
                .with_script(script)
                .map_err(|_| UnrecognizedLocale::new(native_code))
        }
    }
}

fn language_subtag(base: &str) -> Option<&str> {
    match base.len() {
        3 => ISO_639_2
            .iter()
            .find(|(code, _)| *code == base)
            .map(|(code, short)| short.unwrap_or(*code)),
        2 => ISO_639_2
            .iter()
            .find_map(|(_, short)| short.filter(|candidate| *candidate == base)),
        _ => None,
    }
}

fn script_subtag(suffix: &str) -> Option<&'static str> {
    match suffix {
        "sim" => Some("Hans"),
        "tra" => Some("Hant"),
        "latn" => Some("Latn"),
        "cyrl" => Some("Cyrl"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locale(value: &str) -> LocaleIdentifier {
        LocaleIdentifier::parse(value).unwrap()
    }

    #[test]
    fn maps_terminology_and_bibliographic_codes() {
        assert_eq!(resolve("eng").unwrap(), locale("en"));
        assert_eq!(resolve("deu").unwrap(), locale("de"));
        assert_eq!(resolve("ger").unwrap(), locale("de"));
        assert_eq!(resolve(" FRA ").unwrap(), locale("fr"));
    }

    #[test]
    fn keeps_three_letter_codes_without_short_form() {
        assert_eq!(resolve("fil").unwrap(), locale("fil"));
        assert_eq!(resolve("ceb").unwrap(), locale("ceb"));
    }

    #[test]
    fn maps_script_suffixes() {
        assert_eq!(resolve("chi_sim").unwrap(), locale("zh-Hans"));
        assert_eq!(resolve("chi_tra").unwrap(), locale("zh-Hant"));
        assert_eq!(resolve("srp_latn").unwrap(), locale("sr-Latn"));
        assert_eq!(resolve("uzb_cyrl").unwrap(), locale("uz-Cyrl"));
    }

    #[test]
    fn rejects_data_files_and_unknown_variants() {
        for code in ["osd", "equ", "ita_old", "jpn_vert", "chi_sim_vert", "", "xxx", "e"] {
            let err = resolve(code).unwrap_err();
            assert_eq!(err.code, code);
        }
    }

    #[test]
    fn accepts_two_letter_codes() {
        assert_eq!(resolve("en").unwrap(), locale("en"));
        assert!(resolve("qq").is_err());
    }

    #[test]
    fn resolution_is_deterministic() {
        for (code, _) in ISO_639_2 {
            assert_eq!(resolve(code).unwrap(), resolve(code).unwrap());
        }
    }
}
