//! Справочник локаций и маршрутная матрица операторов.
//!
//! Канонические идентификаторы (`port-blair`, `havelock`, `neil`)
//! используются во всём API. Каждый оператор зовёт острова по-своему:
//! Sealink — официальными названиями, Makruzz — строковыми id,
//! Green Ocean — числовыми. Все переводы собраны здесь, чтобы адаптеры
//! не держали собственных словарей.

use crate::models::ferry::FerryOperator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub id: &'static str,
    pub display_name: &'static str,
    aliases: &'static [&'static str],
    /// Официальное название, которое понимает Sealink API.
    pub sealink_name: &'static str,
    pub makruzz_id: &'static str,
    pub green_ocean_id: u32,
}

pub const LOCATIONS: [Location; 3] = [
    Location {
        id: "port-blair",
        display_name: "Port Blair",
        aliases: &["portblair", "pb"],
        sealink_name: "Port Blair",
        makruzz_id: "1",
        green_ocean_id: 1,
    },
    Location {
        id: "havelock",
        display_name: "Havelock (Swaraj Dweep)",
        aliases: &["swaraj-dweep", "swaraj"],
        sealink_name: "Swaraj Dweep",
        makruzz_id: "2",
        green_ocean_id: 2,
    },
    Location {
        id: "neil",
        display_name: "Neil (Shaheed Dweep)",
        aliases: &["shaheed-dweep", "shaheed", "neil-island"],
        sealink_name: "Shaheed Dweep",
        makruzz_id: "3",
        green_ocean_id: 3,
    },
];

/// Ищет локацию по каноническому id или известному алиасу.
/// Регистр и пробелы не значимы: "Port Blair" == "port-blair".
pub fn resolve(raw: &str) -> Option<&'static Location> {
    let needle = raw.trim().to_lowercase().replace([' ', '_'], "-");
    LOCATIONS
        .iter()
        .find(|loc| loc.id == needle || loc.aliases.contains(&needle.as_str()))
}

/// Направленные маршруты оператора, парами канонических id. Обратное
/// направление не выводится: симметричный рейс перечислен обеими парами.
const SEALINK_ROUTES: &[(&str, &str)] = &[
    ("port-blair", "havelock"),
    ("havelock", "port-blair"),
    ("port-blair", "neil"),
    ("neil", "port-blair"),
    ("havelock", "neil"),
    ("neil", "havelock"),
];

const MAKRUZZ_ROUTES: &[(&str, &str)] = &[
    ("port-blair", "havelock"),
    ("havelock", "port-blair"),
    ("port-blair", "neil"),
    ("neil", "port-blair"),
    ("havelock", "neil"),
    ("neil", "havelock"),
];

// Green Ocean ходит только через Порт-Блэр, межостровного
// Havelock <-> Neil у него нет.
const GREEN_OCEAN_ROUTES: &[(&str, &str)] = &[
    ("port-blair", "havelock"),
    ("havelock", "port-blair"),
    ("port-blair", "neil"),
    ("neil", "port-blair"),
];

fn routes_for(operator: FerryOperator) -> &'static [(&'static str, &'static str)] {
    match operator {
        FerryOperator::Sealink => SEALINK_ROUTES,
        FerryOperator::Makruzz => MAKRUZZ_ROUTES,
        FerryOperator::Greenocean => GREEN_OCEAN_ROUTES,
    }
}

/// Обслуживает ли оператор направленный маршрут: проверка по явному
/// списку пар его таблицы.
pub fn is_route_supported(operator: FerryOperator, from: &Location, to: &Location) -> bool {
    routes_for(operator)
        .iter()
        .any(|(f, t)| *f == from.id && *t == to.id)
}
