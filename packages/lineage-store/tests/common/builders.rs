//! Family tree builder
//!
//! Records every person and family as pending patches, keeping the
//! ascend/union/couple/descend links consistent.

use lineage_store::{
    Ascend, Base, Couple, Descend, Family, Ifam, Iper, Person, Sex, Union,
};

pub struct TreeBuilder<'a> {
    base: &'a mut Base,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(base: &'a mut Base) -> Self {
        Self { base }
    }

    /// Add a person with no parents and no unions
    pub fn person(&mut self, first_name: &str, surname: &str, sex: Sex) -> Iper {
        let ip = self.base.new_iper();
        let mut person = Person::unknown(ip);
        person.first_name = self.base.insert_string(first_name).expect("first name");
        person.surname = self.base.insert_string(surname).expect("surname");
        person.sex = sex;
        self.base.patch_person(ip, person);
        self.base.patch_ascend(ip, Ascend::default());
        self.base.patch_union(ip, Union::default());
        ip
    }

    /// Add a family and link parents and children to it
    pub fn family(&mut self, father: Iper, mother: Iper, children: &[Iper]) -> Ifam {
        let ifam = self.base.new_ifam();
        self.base.patch_family(ifam, Family::new(ifam));
        self.base.patch_couple(ifam, Couple::new(father, mother));
        self.base.patch_descend(
            ifam,
            Descend {
                children: children.to_vec(),
            },
        );
        for parent in [father, mother] {
            let mut union = self.base.get_union(parent).expect("parent union");
            union.family.push(ifam);
            self.base.patch_union(parent, union);
        }
        for &child in children {
            let mut ascend = self.base.get_ascend(child).expect("child ascend");
            ascend.parents = Some(ifam);
            self.base.patch_ascend(child, ascend);
        }
        ifam
    }
}

/// Two parents with two children: (father, mother, [children])
pub fn nuclear_family(base: &mut Base) -> (Iper, Iper, Vec<Iper>) {
    let mut tree = TreeBuilder::new(base);
    let father = tree.person("Jean", "Dupont", Sex::Male);
    let mother = tree.person("Marie", "Martin", Sex::Female);
    let a = tree.person("Paul", "Dupont", Sex::Male);
    let b = tree.person("Anne", "Dupont", Sex::Female);
    tree.family(father, mother, &[a, b]);
    (father, mother, vec![a, b])
}
