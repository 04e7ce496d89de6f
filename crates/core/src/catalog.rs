//! Static content catalog: sounds, killer and survivor profiles, and packs.

use std::{collections::HashSet, sync::Arc};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Category a sound is listed under in the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundCategory {
    /// Killer signature sounds.
    Killer,
    /// Generic table sounds.
    Common,
    /// Special events.
    Special,
    /// Looping background ambience.
    Atmosphere,
    /// Interface feedback.
    Ui,
}

/// One entry of the sound library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundAsset {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Listing category.
    pub category: SoundCategory,
    /// Short description.
    pub description: Option<String>,
    /// Whether the sound loops until stopped.
    #[serde(default)]
    pub looping: bool,
    /// Pack ids (and free-form labels) this sound is tagged with.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Killer (antagonist) profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillerProfile {
    /// Stable identifier.
    pub id: String,
    /// Localised display name, used as the role label.
    pub name: String,
    /// Latin codename.
    pub codename: String,
    /// Flavour text.
    pub description: String,
    /// Sound ids associated with this killer.
    #[serde(default)]
    pub signature_sounds: Vec<String>,
    /// Artwork path.
    pub image: Option<String>,
    /// Short trait list.
    #[serde(default)]
    pub traits: Vec<String>,
}

/// Survivor (protagonist) profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurvivorProfile {
    /// Stable identifier.
    pub id: String,
    /// Localised display name, used as the role label.
    pub name: String,
    /// Latin codename.
    pub codename: String,
    /// Flavour text.
    pub description: Option<String>,
    /// Artwork path.
    pub image: Option<String>,
}

/// Content bundle gating which profiles and sounds are selectable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackDefinition {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Flavour text.
    pub description: String,
    /// Killer ids included by the pack.
    #[serde(default)]
    pub killers: Vec<String>,
    /// Survivor ids included by the pack.
    #[serde(default)]
    pub survivors: Vec<String>,
    /// Sound ids included by the pack.
    #[serde(default)]
    pub sounds: Vec<String>,
    /// Whether the pack is a paid expansion.
    #[serde(default)]
    pub dlc: bool,
}

/// Read-only lookup tables keyed by string id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Sound library.
    pub sounds: Vec<SoundAsset>,
    /// Killer profiles.
    pub killers: Vec<KillerProfile>,
    /// Survivor profiles.
    pub survivors: Vec<SurvivorProfile>,
    /// Pack definitions.
    pub packs: Vec<PackDefinition>,
}

static BUILTIN: Lazy<Arc<Catalog>> = Lazy::new(|| Arc::new(builtin_catalog()));

impl Catalog {
    /// The catalog shipped with the application.
    pub fn builtin() -> Arc<Catalog> {
        Arc::clone(&BUILTIN)
    }

    /// Look up a pack by id.
    pub fn pack(&self, id: &str) -> Option<&PackDefinition> {
        self.packs.iter().find(|pack| pack.id == id)
    }

    /// Look up a killer by id.
    pub fn killer(&self, id: &str) -> Option<&KillerProfile> {
        self.killers.iter().find(|killer| killer.id == id)
    }

    /// Look up a survivor by id.
    pub fn survivor(&self, id: &str) -> Option<&SurvivorProfile> {
        self.survivors.iter().find(|survivor| survivor.id == id)
    }

    /// Packs whose id is in `active_ids`, in catalog order.
    pub fn active_packs(&self, active_ids: &[String]) -> Vec<&PackDefinition> {
        self.packs
            .iter()
            .filter(|pack| active_ids.iter().any(|id| id == &pack.id))
            .collect()
    }

    /// Killer ids allowed by the active packs, in active-pack order.
    pub fn allowed_killers(&self, active_ids: &[String]) -> Vec<String> {
        active_ids
            .iter()
            .filter_map(|id| self.pack(id))
            .flat_map(|pack| pack.killers.iter().cloned())
            .collect()
    }

    /// Survivor ids allowed by the active packs.
    pub fn allowed_survivors(&self, active_ids: &[String]) -> HashSet<String> {
        active_ids
            .iter()
            .filter_map(|id| self.pack(id))
            .flat_map(|pack| pack.survivors.iter().cloned())
            .collect()
    }

    /// Killer profiles selectable with the active packs, in catalog order.
    pub fn available_killers(&self, active_ids: &[String]) -> Vec<&KillerProfile> {
        let allowed: HashSet<String> = self.allowed_killers(active_ids).into_iter().collect();
        self.killers
            .iter()
            .filter(|killer| allowed.contains(&killer.id))
            .collect()
    }

    /// Survivor profiles selectable with the active packs, in catalog order.
    pub fn available_survivors(&self, active_ids: &[String]) -> Vec<&SurvivorProfile> {
        let allowed = self.allowed_survivors(active_ids);
        self.survivors
            .iter()
            .filter(|survivor| allowed.contains(&survivor.id))
            .collect()
    }

    /// Sounds tagged with any active pack id, grouped by category in first-seen order.
    pub fn sounds_for_packs(
        &self,
        active_ids: &[String],
    ) -> Vec<(SoundCategory, Vec<&SoundAsset>)> {
        let mut grouped: Vec<(SoundCategory, Vec<&SoundAsset>)> = Vec::new();
        for sound in &self.sounds {
            if !active_ids.iter().any(|id| sound.tags.contains(id)) {
                continue;
            }
            match grouped.iter_mut().find(|(category, _)| *category == sound.category) {
                Some((_, list)) => list.push(sound),
                None => grouped.push((sound.category, vec![sound])),
            }
        }
        grouped
    }

    /// Artwork for a killer profile.
    pub fn killer_image(&self, id: &str) -> Option<&str> {
        self.killer(id).and_then(|killer| killer.image.as_deref())
    }

    /// Artwork for a survivor profile.
    pub fn survivor_image(&self, id: &str) -> Option<&str> {
        self.survivor(id).and_then(|survivor| survivor.image.as_deref())
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn sound(
    id: &str,
    name: &str,
    category: SoundCategory,
    description: &str,
    looping: bool,
    tags: &[&str],
) -> SoundAsset {
    SoundAsset {
        id: id.to_string(),
        name: name.to_string(),
        category,
        description: Some(description.to_string()),
        looping,
        tags: strings(tags),
    }
}

fn killer(
    id: &str,
    name: &str,
    codename: &str,
    description: &str,
    signature_sounds: &[&str],
    traits: &[&str],
) -> KillerProfile {
    KillerProfile {
        id: id.to_string(),
        name: name.to_string(),
        codename: codename.to_string(),
        description: description.to_string(),
        signature_sounds: strings(signature_sounds),
        image: Some(format!("/art/killers/{id}.webp")),
        traits: strings(traits),
    }
}

fn survivor(
    id: &str,
    name: &str,
    codename: &str,
    description: &str,
    image: &str,
) -> SurvivorProfile {
    SurvivorProfile {
        id: id.to_string(),
        name: name.to_string(),
        codename: codename.to_string(),
        description: Some(description.to_string()),
        image: Some(format!("/art/survivors/{image}.webp")),
    }
}

fn pack(
    id: &str,
    name: &str,
    description: &str,
    killers: &[&str],
    survivors: &[&str],
    sounds: &[&str],
) -> PackDefinition {
    PackDefinition {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        killers: strings(killers),
        survivors: strings(survivors),
        sounds: strings(sounds),
        dlc: id != crate::models::BASE_PACK_ID,
    }
}

#[rustfmt::skip]
fn builtin_catalog() -> Catalog {
    use SoundCategory::*;

    let sounds = vec![
        sound("house_whispers", "Шёпот особняка", Atmosphere, "Фоновый шёпот и скрежет отдалённых стен", true, &["base", "ambient"]),
        sound("noise_token", "Жетон шума", Common, "Бросок жетона шума на стол", false, &["token", "base"]),
        sound("panic_breath", "Паническое дыхание", Common, "Тяжёлое дыхание и подавленный крик", false, &["survivors", "base"]),
        sound("lantern_click", "Фонарь", Special, "Включение старого фонаря и гул напряжения", false, &["special", "base"]),
        sound("chainsaw_roar", "Рёв бензопилы", Killer, "Завод бензопилы и резкий набор оборотов", false, &["butcher", "base", "feral-instincts"]),
        sound("spectre_vanish", "Исчезновение", Killer, "Холодный порыв ветра и шёпот призрака", false, &["spectre", "base"]),
        sound("werewolf_howl", "Вой оборотня", Killer, "Протяжный вой и рычание оборотня", false, &["werewolf", "feral-instincts"]),
        sound("siren_blast", "Сирена эвакуации", Special, "Старый громкоговоритель, усиливающий тревогу", false, &["putrefied-enmity"]),
        sound("door_slam", "Баррикада", Common, "Гулкий удар тяжёлой двери", false, &["base"]),
        sound("hammering", "Баррикада", Killer, "Звук забивания баррикады", false, &["butcher", "base"]),
    ];

    let killers = vec![
        killer("butcher", "Мясник", "Butcher", "Гора мышц, вооружённая бензопилой.", &["chainsaw_roar", "hammering"], &["Шквальный урон", "Прямолинейная охота", "Шумовой прессинг"]),
        killer("spectre", "Призрак", "Spectre", "Существо иной природы, исчезающее в тени.", &["spectre_vanish", "house_whispers"], &["Скрытность", "Психологический прессинг", "Контроль пространства"]),
        killer("werewolf", "Оборотень", "Werewolf", "Ярость больше не зависит от лунных циклов.", &["werewolf_howl"], &["Неумолимая ярость", "Чуткий нюх", "Прорыв обороны"]),
        killer("huntress", "Охотница", "Huntress", "Воспитанная волками, ставит капканы в своём лесу.", &[], &["Призрачные капканы", "Дальний бросок", "Лесное чутьё"]),
    ];

    let survivors = vec![
        survivor("sophia_scott", "София Скотт", "Sophia Scott", "Смелая, но осторожная.", "sophia"),
        survivor("johnson_nispel", "Джонсон Ниспел", "Johnson Nispel", "Прагматик, мгновенно оценивающий риск.", "johnson"),
        survivor("marco_carven", "Марко Карвен", "Marco Carven", "Ветеран расследований сверхъестественного.", "marco"),
        survivor("anna_kubrick", "Анна Кубрик", "Anna Kubrick", "Хладнокровный стратег.", "anna"),
        survivor("william_hooper", "Уильям Хупер", "William Hooper", "Отважный механик.", "william"),
        survivor("george_carpenter", "Джордж Карпентер", "George Carpenter", "Исследователь древних тайн.", "george"),
    ];

    let packs = vec![
        pack(
            "base",
            "База",
            "Основные убийцы, жертвы и атмосфера особняка.",
            &["butcher", "spectre"],
            &["sophia_scott", "johnson_nispel", "marco_carven", "anna_kubrick", "william_hooper"],
            &["house_whispers", "noise_token", "panic_breath", "lantern_click", "spectre_vanish", "chainsaw_roar", "door_slam"],
        ),
        pack("feral-instincts", "Животный инстинкт", "Домик у озера и человекоподобный волк.", &["werewolf", "huntress"], &[], &["chainsaw_roar"]),
        pack("amorphous-peril", "Угроза извне", "Заброшенная лаборатория и плотоядное растение.", &[], &[], &[]),
        pack("lethal-immortals", "Безжизненные бессмертные", "Замок на скале и ожившие каменные воины.", &[], &["george_carpenter"], &[]),
        pack("putrefied-enmity", "Королева Мёртвых", "Древняя гробница и пробудившееся существо.", &[], &[], &["siren_blast"]),
    ];

    Catalog {
        sounds,
        killers,
        survivors,
        packs,
    }
}
